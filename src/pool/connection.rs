//! 池化连接模块
//!
//! 池化连接独占一个物理连接及其语句缓存。生命周期：
//! 创建 → 活跃 ⇄ 空闲 → 销毁（终态，不可再次借出）。

use chrono::{DateTime, Utc};
use parking_lot::Mutex as SyncMutex;
use rat_logger::{debug, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use uuid::Uuid;

use super::{
    ConnectionEvent, ConnectionEventListener, RawConnection, RawStatement, StatementEvent,
    StatementEventListener,
};
use crate::cache::{CacheStats, CachedStatement, StatementCache};
use crate::error::QuickPoolResult;
use crate::types::{StatementKind, StatementOptions, TransactionIsolation};

/// 物理连接与语句缓存，二者总是一起加锁
struct ConnectionCore {
    raw: Box<dyn RawConnection>,
    cache: StatementCache,
}

/// 池化连接
pub struct PooledConnection {
    id: Uuid,
    transactional: bool,
    created_at: DateTime<Utc>,
    last_active_at: SyncMutex<DateTime<Utc>>,
    closed: AtomicBool,
    core: Mutex<ConnectionCore>,
    connection_listeners: SyncMutex<Vec<Arc<dyn ConnectionEventListener>>>,
    statement_listeners: SyncMutex<Vec<Arc<dyn StatementEventListener>>>,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("transactional", &self.transactional)
            .field("created_at", &self.created_at)
            .field("last_active_at", &self.last_active_at())
            .field("closed", &self.is_closed())
            .field("raw", &"<RawConnection>")
            .finish()
    }
}

impl PooledConnection {
    pub fn new(raw: Box<dyn RawConnection>, transactional: bool, cache_limit_size: i32) -> Self {
        let id = Uuid::new_v4();
        let now = Utc::now();
        Self {
            id,
            transactional,
            created_at: now,
            last_active_at: SyncMutex::new(now),
            closed: AtomicBool::new(false),
            core: Mutex::new(ConnectionCore {
                raw,
                cache: StatementCache::new(id, cache_limit_size),
            }),
            connection_listeners: SyncMutex::new(Vec::new()),
            statement_listeners: SyncMutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_transactional(&self) -> bool {
        self.transactional
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_active_at(&self) -> DateTime<Utc> {
        *self.last_active_at.lock()
    }

    /// 刷新最后活跃时间
    pub fn touch(&self) {
        *self.last_active_at.lock() = Utc::now();
    }

    /// 是否已销毁
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 锁定并返回底层物理连接，用于透传驱动自身的接口
    pub async fn raw(&self) -> MappedMutexGuard<'_, dyn RawConnection> {
        MutexGuard::map(self.core.lock().await, |core| &mut *core.raw)
    }

    /// 准备参数化语句
    pub async fn prepare_statement(&self, sql: &str) -> QuickPoolResult<Arc<CachedStatement>> {
        self.get_or_create_statement(StatementKind::Prepared, sql, &StatementOptions::Plain)
            .await
    }

    /// 使用指定选项准备参数化语句
    pub async fn prepare_statement_with(
        &self,
        sql: &str,
        options: StatementOptions,
    ) -> QuickPoolResult<Arc<CachedStatement>> {
        self.get_or_create_statement(StatementKind::Prepared, sql, &options)
            .await
    }

    /// 准备存储过程调用语句
    pub async fn prepare_call(&self, sql: &str) -> QuickPoolResult<Arc<CachedStatement>> {
        self.get_or_create_statement(StatementKind::Callable, sql, &StatementOptions::Plain)
            .await
    }

    /// 使用指定选项准备存储过程调用语句
    pub async fn prepare_call_with(
        &self,
        sql: &str,
        options: StatementOptions,
    ) -> QuickPoolResult<Arc<CachedStatement>> {
        self.get_or_create_statement(StatementKind::Callable, sql, &options)
            .await
    }

    /// 创建普通语句，直接透传给物理连接，不参与缓存
    pub async fn create_statement(&self) -> QuickPoolResult<Box<dyn RawStatement>> {
        let mut core = self.core.lock().await;
        let statement = core.raw.create_statement().await?;
        drop(core);
        self.touch();
        Ok(statement)
    }

    /// 从语句缓存中获取或创建语句
    pub async fn get_or_create_statement(
        &self,
        kind: StatementKind,
        sql: &str,
        options: &StatementOptions,
    ) -> QuickPoolResult<Arc<CachedStatement>> {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        let statement = core
            .cache
            .get_or_create(core.raw.as_mut(), kind, sql, options)
            .await?;
        drop(guard);
        self.touch();
        Ok(statement)
    }

    /// 当前缓存的语句数
    pub async fn cached_statement_count(&self) -> usize {
        self.core.lock().await.cache.len()
    }

    /// 当前缓存的语句快照
    pub async fn cached_statements(&self) -> Vec<Arc<CachedStatement>> {
        self.core.lock().await.cache.entries()
    }

    /// 语句缓存统计
    pub async fn cache_stats(&self) -> CacheStats {
        self.core.lock().await.cache.stats()
    }

    /// 在超时时间内校验连接
    ///
    /// 超时、返回错误或返回 false 都视为校验失败
    pub async fn validate(&self, timeout_secs: u64) -> bool {
        if self.is_closed() {
            return false;
        }
        crate::debug_log!(
            "校验连接: id={}, 创建时间={}, 最后活跃={}",
            self.id,
            self.created_at.format("%Y-%m-%d %H:%M:%S"),
            self.last_active_at().format("%Y-%m-%d %H:%M:%S")
        );

        let check = async {
            let mut core = self.core.lock().await;
            core.raw.is_valid(timeout_secs).await
        };
        let result = if timeout_secs == 0 {
            check.await
        } else {
            match tokio::time::timeout(Duration::from_secs(timeout_secs), check).await {
                Ok(result) => result,
                Err(_) => Err(crate::quick_error!(
                    validation,
                    format!("校验超过 {} 秒未返回", timeout_secs)
                )),
            }
        };

        match result {
            Ok(valid) => valid,
            Err(e) => {
                debug!("连接校验出错: id={}, 错误={}", self.id, e);
                false
            }
        }
    }

    /// 复用前重置连接状态
    ///
    /// 恢复自动提交；事务型连接池还会把隔离级别重置为无事务
    pub async fn reset(&self) -> QuickPoolResult<()> {
        let mut core = self.core.lock().await;
        core.raw.set_auto_commit(true).await?;
        if self.transactional {
            core.raw
                .set_transaction_isolation(TransactionIsolation::None)
                .await?;
        }
        Ok(())
    }

    /// 归还前检查语句缓存，超出容量时全部清理
    ///
    /// 每次插入都会执行淘汰，正常情况下不会触发
    pub async fn trim_statement_cache(&self) {
        let mut core = self.core.lock().await;
        if core.cache.is_overflowed() {
            warn!(
                "语句缓存超出容量，全部清理: id={}, 条目数={}, 容量={}",
                self.id,
                core.cache.len(),
                core.cache.limit()
            );
            core.cache.clear().await;
        }
    }

    /// 销毁连接
    ///
    /// 无论缓存容量如何都关闭全部缓存语句并逐个通知语句监听器，
    /// 随后通知连接监听器并关闭物理连接。重复调用直接返回。
    pub async fn destroy(&self) -> QuickPoolResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut core = self.core.lock().await;
        let statement_listeners = self.statement_listeners.lock().clone();
        for statement in core.cache.drain() {
            let result = statement.destroy().await;
            let event = StatementEvent {
                connection_id: self.id,
                identify_key: statement.identify_key().to_string(),
                kind: statement.kind(),
                error: result.as_ref().err().map(|e| e.to_string()),
            };
            for listener in &statement_listeners {
                match result {
                    Ok(()) => listener.statement_closed(&event),
                    Err(_) => listener.statement_error_occurred(&event),
                }
            }
        }

        let connection_listeners = self.connection_listeners.lock().clone();
        let closed_event = ConnectionEvent {
            connection_id: self.id,
            error: None,
        };
        for listener in &connection_listeners {
            listener.connection_closed(&closed_event);
        }

        let result = core.raw.close().await;
        if let Err(e) = &result {
            let error_event = ConnectionEvent {
                connection_id: self.id,
                error: Some(e.to_string()),
            };
            for listener in &connection_listeners {
                listener.connection_error_occurred(&error_event);
            }
        }
        debug!("物理连接已关闭: id={}", self.id);
        result
    }

    pub fn add_connection_event_listener(&self, listener: Arc<dyn ConnectionEventListener>) {
        self.connection_listeners.lock().push(listener);
    }

    pub fn remove_connection_event_listener(&self, listener: &Arc<dyn ConnectionEventListener>) {
        self.connection_listeners
            .lock()
            .retain(|existing| !Arc::ptr_eq(existing, listener));
    }

    pub fn add_statement_event_listener(&self, listener: Arc<dyn StatementEventListener>) {
        self.statement_listeners.lock().push(listener);
    }

    pub fn remove_statement_event_listener(&self, listener: &Arc<dyn StatementEventListener>) {
        self.statement_listeners
            .lock()
            .retain(|existing| !Arc::ptr_eq(existing, listener));
    }
}
