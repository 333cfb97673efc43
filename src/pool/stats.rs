//! 连接池统计模块

use serde::{Deserialize, Serialize};

/// 连接池状态快照
///
/// 供外部监控与管理使用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// 空闲连接数
    pub idle_count: usize,
    /// 活跃连接数
    pub active_count: usize,
    /// 正在创建或校验中的连接数
    pub pending_count: usize,
    /// 正在等待获取连接的调用者数
    pub wait_count: usize,
    /// 是否已关闭
    pub closed: bool,
    /// 最小连接数
    pub min_connections: usize,
    /// 最大连接数
    pub max_connections: usize,
    /// 新建连接的语句缓存容量
    pub cache_limit_size: i32,
}

impl PoolStats {
    /// 已占用的连接总数
    pub fn total_count(&self) -> usize {
        self.idle_count + self.active_count + self.pending_count
    }

    /// 活跃连接占最大连接数的比例
    pub fn utilization(&self) -> f64 {
        if self.max_connections == 0 {
            0.0
        } else {
            self.active_count as f64 / self.max_connections as f64
        }
    }
}
