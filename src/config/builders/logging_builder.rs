//! # 日志配置构建器模块

use crate::config::core::{LogLevel, LoggingConfig};
use crate::error::QuickPoolResult;
use rat_logger::info;

/// 日志配置构建器
#[derive(Debug, Default)]
pub struct LoggingConfigBuilder {
    level: Option<LogLevel>,
    console: Option<bool>,
}

impl LoggingConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置日志级别
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    /// 设置是否输出到控制台
    pub fn console(mut self, console: bool) -> Self {
        self.console = Some(console);
        self
    }

    /// 构建日志配置
    ///
    /// # 错误
    ///
    /// 如果任何必需的配置项未设置，将返回错误
    pub fn build(self) -> QuickPoolResult<LoggingConfig> {
        let level = self
            .level
            .ok_or_else(|| crate::quick_error!(config, "日志级别必须设置"))?;

        let console = self
            .console
            .ok_or_else(|| crate::quick_error!(config, "控制台输出选项必须设置"))?;

        info!("创建日志配置: 级别={:?}, 控制台={}", level, console);

        Ok(LoggingConfig { level, console })
    }
}
