//! 连接池模块
//!
//! 有界的可复用数据库连接池：空闲队列、活跃集合、后台补充任务，
//! 以及每个连接独占的语句缓存

pub mod types;
pub mod config;
pub mod connection;
pub mod handle;
pub mod pool;
pub mod stats;
pub(crate) mod worker;

pub use types::{
    ConnectionEvent, ConnectionEventListener, ConnectionFactory, RawConnection, RawStatement,
    StatementEvent, StatementEventListener,
};
pub use config::PoolSettings;
pub use connection::PooledConnection;
pub use handle::PoolConnection;
pub use pool::QuickPool;
pub use stats::PoolStats;
pub(crate) use worker::WorkerSupervisor;
