//! rat_quickpool - 带语句缓存的数据库连接池
//!
//! 维护有界的可复用数据库连接集合：后台任务把空闲连接补充到最小连接数，
//! 获取连接在超时时间内排队等待，归还时按需校验、重置后放回空闲队列。
//! 每个连接独占一个按命中次数淘汰的参数化语句缓存。
//!
//! 物理连接与语句由调用者通过 [`ConnectionFactory`] 提供，本库不绑定任何数据库驱动。

pub mod error;
pub mod types;
pub mod cache;
pub mod pool;
pub mod config;
pub mod i18n;

pub use error::{QuickPoolError, QuickPoolResult};
pub use types::*;
pub use cache::{CacheStats, CachedStatement, StatementCache, generate_identify_key};
pub use pool::{
    ConnectionEvent, ConnectionEventListener, ConnectionFactory, PoolConnection, PoolStats,
    PooledConnection, QuickPool, RawConnection, RawStatement, StatementEvent,
    StatementEventListener,
};
pub use config::{LogLevel, LoggingConfig, LoggingConfigBuilder, PoolConfigBuilder};

// 条件编译调试宏 - 只有在 debug 模式下才输出调试信息
#[cfg(debug_assertions)]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        rat_logger::debug!($($arg)*);
    };
}

#[cfg(not(debug_assertions))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        // 在 release 模式下不输出调试信息
    };
}

/// 初始化rat_quickpool库
///
/// 注册多语言错误消息，可重复调用。创建连接池时会自动调用。
///
/// 注意：日志系统由调用者自行初始化，见 [`LoggingConfig::init_logger`]
pub fn init() {
    i18n::ErrorMessageI18n::init();
}

/// 库版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 库名称
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// 获取库信息
pub fn get_info() -> String {
    format!("{} v{}", NAME, VERSION)
}
