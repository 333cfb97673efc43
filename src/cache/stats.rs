//! 语句缓存统计模块

use serde::{Deserialize, Serialize};

/// 语句缓存统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// 缓存命中次数
    pub hits: u64,
    /// 缓存未命中次数（新建语句）
    pub misses: u64,
    /// 淘汰的语句数
    pub evictions: u64,
    /// 当前缓存条目数
    pub entries: usize,
    /// 缓存容量上限
    pub limit: i32,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
