//! 缓存语句模块

use async_trait::async_trait;
use rat_logger::{debug, warn};
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::QuickPoolResult;
use crate::pool::RawStatement;
use crate::types::StatementKind;

/// 缓存语句
///
/// 包装一个物理语句句柄，记录缓存键与命中次数。
/// 处于缓存中的语句被调用者关闭时只做清理，物理句柄保留给下一次复用；
/// 未缓存（或已被淘汰）的语句关闭时会真正关闭物理句柄。
/// 最后一个引用被丢弃时若句柄仍未关闭，则在当前tokio运行时中异步关闭。
pub struct CachedStatement {
    identify_key: String,
    kind: StatementKind,
    connection_id: Uuid,
    hit_count: AtomicU64,
    cached: AtomicBool,
    closed: AtomicBool,
    handle: Mutex<Box<dyn RawStatement>>,
}

impl std::fmt::Debug for CachedStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedStatement")
            .field("identify_key", &self.identify_key)
            .field("kind", &self.kind)
            .field("connection_id", &self.connection_id)
            .field("hit_count", &self.hit_count())
            .field("cached", &self.is_cached())
            .field("closed", &self.is_closed())
            .field("handle", &"<RawStatement>")
            .finish()
    }
}

impl CachedStatement {
    pub(crate) fn new(
        connection_id: Uuid,
        identify_key: String,
        kind: StatementKind,
        handle: Box<dyn RawStatement>,
        cached: bool,
    ) -> Self {
        Self {
            identify_key,
            kind,
            connection_id,
            hit_count: AtomicU64::new(0),
            cached: AtomicBool::new(cached),
            closed: AtomicBool::new(false),
            handle: Mutex::new(handle),
        }
    }

    /// 缓存键
    pub fn identify_key(&self) -> &str {
        &self.identify_key
    }

    /// 语句类型
    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// 所属池化连接ID
    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// 命中次数
    pub fn hit_count(&self) -> u64 {
        self.hit_count.load(Ordering::SeqCst)
    }

    pub(crate) fn increment_hit_count(&self) -> u64 {
        self.hit_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// 是否仍由语句缓存持有
    pub fn is_cached(&self) -> bool {
        self.cached.load(Ordering::SeqCst)
    }

    /// 物理句柄是否已关闭
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 从缓存中摘除，之后由持有者负责关闭
    pub(crate) fn detach(&self) {
        self.cached.store(false, Ordering::SeqCst);
    }

    /// 锁定并返回底层物理语句
    ///
    /// 执行类接口全部透传给驱动，需要驱动类型时配合 `as_any` 向下转型
    pub async fn handle(&self) -> MappedMutexGuard<'_, dyn RawStatement> {
        MutexGuard::map(self.handle.lock().await, |handle| &mut **handle)
    }

    /// 调用者关闭语句
    ///
    /// 缓存中的语句只清空批处理、参数与警告，物理句柄继续留在缓存中
    pub async fn close(&self) -> QuickPoolResult<()> {
        if !self.is_cached() {
            return self.destroy().await;
        }
        let mut handle = self.handle.lock().await;
        handle.clear_batch().await?;
        handle.clear_parameters().await?;
        handle.clear_warnings().await?;
        debug!("缓存语句已归还: key={}", self.identify_key);
        Ok(())
    }

    /// 关闭物理句柄，重复调用无副作用
    pub(crate) async fn destroy(&self) -> QuickPoolResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.cached.store(false, Ordering::SeqCst);
        let mut handle = self.handle.lock().await;
        handle.close().await.map_err(|e| {
            warn!("关闭物理语句失败: key={}, 错误={}", self.identify_key, e);
            e
        })
    }
}

/// 句柄被移出后留在原位的占位语句
struct ReleasedStatement;

#[async_trait]
impl RawStatement for ReleasedStatement {
    async fn clear_batch(&mut self) -> QuickPoolResult<()> {
        Ok(())
    }

    async fn clear_parameters(&mut self) -> QuickPoolResult<()> {
        Ok(())
    }

    async fn clear_warnings(&mut self) -> QuickPoolResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> QuickPoolResult<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for CachedStatement {
    fn drop(&mut self) {
        if *self.closed.get_mut() {
            return;
        }
        *self.closed.get_mut() = true;

        let mut handle = std::mem::replace(self.handle.get_mut(), Box::new(ReleasedStatement));
        let identify_key = std::mem::take(&mut self.identify_key);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!("语句未显式关闭，异步关闭物理句柄: key={}", identify_key);
                runtime.spawn(async move {
                    if let Err(e) = handle.close().await {
                        warn!("关闭物理语句失败: key={}, 错误={}", identify_key, e);
                    }
                });
            }
            Err(_) => {
                warn!("语句未显式关闭且不在tokio运行时中，物理句柄随之释放: key={}", identify_key);
            }
        }
    }
}
