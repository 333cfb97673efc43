//! 语句缓存模块
//!
//! 每个池化连接独占一个语句缓存。条目按命中次数降序排列，
//! 命中次数相同的条目保持插入先后顺序，超出容量的尾部条目被淘汰。
//! 这是偏向访问频率的淘汰策略而非LRU：久未使用但命中多的语句会被保留。

use rat_logger::{debug, warn};
use std::sync::Arc;
use uuid::Uuid;

use super::{CacheStats, CachedStatement, generate_identify_key};
use crate::error::QuickPoolResult;
use crate::pool::RawConnection;
use crate::types::{StatementKind, StatementOptions};

/// 语句缓存
pub struct StatementCache {
    connection_id: Uuid,
    limit: i32,
    entries: Vec<Arc<CachedStatement>>,
    stats: CacheStats,
}

impl std::fmt::Debug for StatementCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementCache")
            .field("connection_id", &self.connection_id)
            .field("limit", &self.limit)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl StatementCache {
    pub fn new(connection_id: Uuid, limit: i32) -> Self {
        Self {
            connection_id,
            limit,
            entries: Vec::new(),
            stats: CacheStats {
                limit,
                ..CacheStats::default()
            },
        }
    }

    /// 是否启用缓存（容量大于0）
    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    pub fn limit(&self) -> i32 {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 缓存是否超出容量
    pub fn is_overflowed(&self) -> bool {
        (self.entries.len() as i64) > (self.limit.max(0) as i64)
    }

    /// 当前条目快照，按淘汰顺序从保留到淘汰排列
    pub fn entries(&self) -> Vec<Arc<CachedStatement>> {
        self.entries.clone()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            ..self.stats.clone()
        }
    }

    /// 获取或创建缓存语句
    ///
    /// 缓存禁用时每次都新建且不保存；否则命中时增加命中次数，
    /// 未命中时通过物理连接准备新语句并插入，随后重新排序并淘汰超出容量的条目。
    pub async fn get_or_create(
        &mut self,
        raw: &mut dyn RawConnection,
        kind: StatementKind,
        sql: &str,
        options: &StatementOptions,
    ) -> QuickPoolResult<Arc<CachedStatement>> {
        let identify_key = generate_identify_key(kind, sql, options)?;

        if !self.is_enabled() {
            let handle = Self::prepare(raw, kind, sql, options).await?;
            self.stats.misses += 1;
            return Ok(Arc::new(CachedStatement::new(
                self.connection_id,
                identify_key,
                kind,
                handle,
                false,
            )));
        }

        let index = match self
            .entries
            .iter()
            .position(|entry| entry.identify_key() == identify_key)
        {
            Some(index) => {
                self.stats.hits += 1;
                index
            }
            None => {
                let handle = Self::prepare(raw, kind, sql, options).await?;
                self.stats.misses += 1;
                self.entries.push(Arc::new(CachedStatement::new(
                    self.connection_id,
                    identify_key,
                    kind,
                    handle,
                    true,
                )));
                self.entries.len() - 1
            }
        };

        let statement = Arc::clone(&self.entries[index]);
        let hit_count = statement.increment_hit_count();
        self.promote(index);
        self.evict_overflow().await;

        debug!(
            "获取缓存语句: connection={}, key={}, hit_count={}, cached={}",
            self.connection_id,
            statement.identify_key(),
            hit_count,
            statement.is_cached()
        );
        Ok(statement)
    }

    async fn prepare(
        raw: &mut dyn RawConnection,
        kind: StatementKind,
        sql: &str,
        options: &StatementOptions,
    ) -> QuickPoolResult<Box<dyn crate::pool::RawStatement>> {
        let result = match kind {
            StatementKind::Prepared => raw.prepare_statement(sql, options).await,
            StatementKind::Callable => raw.prepare_call(sql, options).await,
        };
        result.map_err(|e| {
            crate::quick_error!(
                statement,
                crate::i18n::tf("error.statement_prepare", &[("message", &e.to_string())])
            )
        })
    }

    /// 将命中次数增加后的条目前移，保持降序且同值条目相对顺序不变
    fn promote(&mut self, mut index: usize) {
        while index > 0
            && self.entries[index - 1].hit_count() < self.entries[index].hit_count()
        {
            self.entries.swap(index - 1, index);
            index -= 1;
        }
    }

    /// 淘汰超出容量的尾部条目
    ///
    /// 仍被调用者持有的条目只从缓存摘除，持有者关闭它或丢弃最后一个引用时释放物理句柄
    async fn evict_overflow(&mut self) {
        let limit = self.limit.max(0) as usize;
        if self.entries.len() <= limit {
            return;
        }
        let evicted = self.entries.split_off(limit);
        for entry in evicted {
            self.stats.evictions += 1;
            entry.detach();
            debug!(
                "淘汰缓存语句: connection={}, key={}, hit_count={}",
                self.connection_id,
                entry.identify_key(),
                entry.hit_count()
            );
            if Arc::strong_count(&entry) == 1 {
                if let Err(e) = entry.destroy().await {
                    warn!("关闭被淘汰的语句失败: {}", e);
                }
            }
        }
    }

    /// 关闭全部缓存语句
    pub async fn clear(&mut self) {
        for entry in self.entries.drain(..) {
            if let Err(e) = entry.destroy().await {
                warn!("清理缓存语句失败: {}", e);
            }
        }
    }

    /// 取出全部缓存条目，交由调用者逐个关闭
    pub(crate) fn drain(&mut self) -> Vec<Arc<CachedStatement>> {
        self.entries.drain(..).collect()
    }
}
