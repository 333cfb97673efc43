//! 错误处理模块
//!
//! 定义连接池与语句缓存的统一错误类型。
//! 只有获取连接路径上的错误（超时、连接池已关闭）会返回给调用者，
//! 其余创建、校验、销毁失败均在内部记录日志并就地恢复。

use thiserror::Error;

/// 连接池错误类型
#[derive(Error, Debug)]
pub enum QuickPoolError {
    /// 在超时时间内无法获取可用连接
    #[error("{message}")]
    AcquireTimeout { message: String, timeout_secs: u64 },

    /// 连接池已关闭
    #[error("{message}")]
    PoolClosed { message: String },

    /// 物理连接创建失败
    #[error("连接创建失败: {message}")]
    ConnectionError { message: String },

    /// 连接校验失败
    #[error("连接校验失败: {message}")]
    ValidationError { message: String },

    /// 关闭物理连接失败
    #[error("连接销毁失败: {message}")]
    DestroyError { message: String },

    /// 语句创建或关闭失败
    #[error("语句操作失败: {message}")]
    StatementError { message: String },

    /// 底层驱动返回的错误
    #[error("驱动错误: {message}")]
    DriverError { message: String },

    /// 配置错误
    #[error("配置错误: {message}")]
    ConfigError { message: String },

    /// 序列化错误
    #[error("序列化错误: {message}")]
    SerializationError { message: String },

    /// IO错误
    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),
}

/// 连接池结果类型
pub type QuickPoolResult<T> = Result<T, QuickPoolError>;

impl QuickPoolError {
    /// 是否为需要返回给获取者的错误
    pub fn is_acquire_failure(&self) -> bool {
        matches!(
            self,
            QuickPoolError::AcquireTimeout { .. } | QuickPoolError::PoolClosed { .. }
        )
    }
}

impl From<serde_json::Error> for QuickPoolError {
    fn from(err: serde_json::Error) -> Self {
        QuickPoolError::SerializationError {
            message: err.to_string(),
        }
    }
}

/// 快速构造错误的宏
///
/// ```ignore
/// let err = quick_error!(config, "最小连接数必须设置");
/// let err = quick_error!(driver, format!("打开失败: {}", reason));
/// ```
#[macro_export]
macro_rules! quick_error {
    (connection, $msg:expr) => {
        $crate::error::QuickPoolError::ConnectionError {
            message: ($msg).to_string(),
        }
    };
    (validation, $msg:expr) => {
        $crate::error::QuickPoolError::ValidationError {
            message: ($msg).to_string(),
        }
    };
    (destroy, $msg:expr) => {
        $crate::error::QuickPoolError::DestroyError {
            message: ($msg).to_string(),
        }
    };
    (statement, $msg:expr) => {
        $crate::error::QuickPoolError::StatementError {
            message: ($msg).to_string(),
        }
    };
    (driver, $msg:expr) => {
        $crate::error::QuickPoolError::DriverError {
            message: ($msg).to_string(),
        }
    };
    (config, $msg:expr) => {
        $crate::error::QuickPoolError::ConfigError {
            message: ($msg).to_string(),
        }
    };
    (serialization, $msg:expr) => {
        $crate::error::QuickPoolError::SerializationError {
            message: ($msg).to_string(),
        }
    };
}
