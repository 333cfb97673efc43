//! # 配置管理模块
//!
//! 连接池配置与日志配置的构建器及配置文件读写

pub mod builders;
pub mod core;

pub use builders::{LoggingConfigBuilder, PoolConfigBuilder};
pub use core::{LogLevel, LoggingConfig};
