//! 连接池类型定义
//!
//! 定义连接池配置、语句选项与事务隔离级别等通用类型

pub mod pool_config;
pub mod statement;

// 重新导出所有公共类型以保持API兼容性
pub use pool_config::{Credentials, PoolConfig};
pub use statement::{
    KeyType, ResultSetConcurrency, ResultSetHoldability, ResultSetType, StatementKind,
    StatementOptions, TransactionIsolation,
};
