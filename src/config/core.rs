//! # 配置管理模块 - 核心配置类型
//!
//! 日志配置与配置文件读写。扩展名为 `.toml` 的文件按TOML处理，其余按JSON处理。

use crate::error::QuickPoolResult;
use crate::types::PoolConfig;
use rat_logger::{LevelFilter, LoggerBuilder, handler::term::TermConfig, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,
    /// 是否输出到控制台
    pub console: bool,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// 关闭日志
    Off,
    /// 错误级别
    Error,
    /// 警告级别
    Warn,
    /// 信息级别
    Info,
    /// 调试级别
    Debug,
    /// 跟踪级别
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl LoggingConfig {
    /// 创建日志配置构建器
    pub fn builder() -> super::builders::LoggingConfigBuilder {
        super::builders::LoggingConfigBuilder::new()
    }

    /// 按配置初始化全局日志
    ///
    /// 本库从不自行初始化日志，由应用在启动时调用
    pub fn init_logger(&self) -> QuickPoolResult<()> {
        let mut builder = LoggerBuilder::new().with_level(self.level.into());
        if self.console {
            builder = builder.add_terminal_with_config(TermConfig::default());
        }
        builder.init().map_err(|e| {
            crate::quick_error!(
                config,
                crate::i18n::tf("error.logger_init", &[("message", &e.to_string())])
            )
        })
    }

    /// 从配置文件加载
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> QuickPoolResult<Self> {
        load_file(config_path.as_ref())
    }

    /// 保存到配置文件
    pub fn save_to_file<P: AsRef<Path>>(&self, config_path: P) -> QuickPoolResult<()> {
        save_file(self, config_path.as_ref())
    }
}

impl PoolConfig {
    /// 创建连接池配置构建器
    pub fn builder() -> super::builders::PoolConfigBuilder {
        super::builders::PoolConfigBuilder::new()
    }

    /// 从配置文件加载，加载后立即校验
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> QuickPoolResult<Self> {
        let config: PoolConfig = load_file(config_path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// 保存到配置文件
    pub fn save_to_file<P: AsRef<Path>>(&self, config_path: P) -> QuickPoolResult<()> {
        save_file(self, config_path.as_ref())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("toml")
}

fn load_file<T: DeserializeOwned>(path: &Path) -> QuickPoolResult<T> {
    let content = std::fs::read_to_string(path)?;

    let config = if is_toml(path) {
        toml::from_str(&content).map_err(|e| {
            crate::quick_error!(
                config,
                crate::i18n::tf("error.config_parse", &[("message", &e.to_string())])
            )
        })?
    } else {
        serde_json::from_str(&content).map_err(|e| {
            crate::quick_error!(
                config,
                crate::i18n::tf("error.config_parse", &[("message", &e.to_string())])
            )
        })?
    };

    info!("从文件加载配置: {:?}", path);
    Ok(config)
}

fn save_file<T: Serialize>(value: &T, path: &Path) -> QuickPoolResult<()> {
    let content = if is_toml(path) {
        toml::to_string_pretty(value)
            .map_err(|e| crate::quick_error!(serialization, format!("序列化TOML配置失败: {}", e)))?
    } else {
        serde_json::to_string_pretty(value)
            .map_err(|e| crate::quick_error!(serialization, format!("序列化JSON配置失败: {}", e)))?
    };

    std::fs::write(path, content)?;

    info!("保存配置到文件: {:?}", path);
    Ok(())
}
