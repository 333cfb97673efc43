//! # 连接池配置构建器模块
//!
//! 提供连接池配置的构建器实现，支持链式调用和严格验证

use crate::error::QuickPoolResult;
use crate::types::PoolConfig;
use rat_logger::info;
use std::collections::HashMap;

/// 连接池配置构建器
///
/// 容量、超时、缓存与校验相关的配置项必须显式设置；
/// 连接属性、凭据与重试间隔可省略
#[derive(Debug, Default)]
pub struct PoolConfigBuilder {
    min_connections: Option<u32>,
    max_connections: Option<u32>,
    validate_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
    cache_limit_size: Option<i32>,
    transactional: Option<bool>,
    test_on_borrow: Option<bool>,
    test_on_return: Option<bool>,
    retry_limit: Option<u32>,
    retry_interval_ms: Option<u64>,
    url: Option<String>,
    properties: HashMap<String, String>,
    username: Option<String>,
    password: Option<String>,
}

impl PoolConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置最小连接数
    ///
    /// # 参数
    ///
    /// * `min_connections` - 最小连接数，同时是空闲队列容量
    pub fn min_connections(mut self, min_connections: u32) -> Self {
        self.min_connections = Some(min_connections);
        self
    }

    /// 设置最大连接数
    ///
    /// # 参数
    ///
    /// * `max_connections` - 最大连接数
    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = Some(max_connections);
        self
    }

    /// 设置连接校验超时时间（秒）
    pub fn validate_timeout(mut self, timeout: u64) -> Self {
        self.validate_timeout_secs = Some(timeout);
        self
    }

    /// 设置获取连接超时时间（秒）
    ///
    /// # 参数
    ///
    /// * `timeout` - 获取连接超时时间（秒）
    pub fn connect_timeout(mut self, timeout: u64) -> Self {
        self.connect_timeout_secs = Some(timeout);
        self
    }

    /// 设置每个连接的语句缓存容量，小于等于0表示禁用
    pub fn cache_limit_size(mut self, size: i32) -> Self {
        self.cache_limit_size = Some(size);
        self
    }

    pub fn transactional(mut self, transactional: bool) -> Self {
        self.transactional = Some(transactional);
        self
    }

    pub fn test_on_borrow(mut self, test_on_borrow: bool) -> Self {
        self.test_on_borrow = Some(test_on_borrow);
        self
    }

    pub fn test_on_return(mut self, test_on_return: bool) -> Self {
        self.test_on_return = Some(test_on_return);
        self
    }

    /// 设置补充任务最大重试次数
    pub fn retry_limit(mut self, retries: u32) -> Self {
        self.retry_limit = Some(retries);
        self
    }

    /// 设置补充任务重试间隔（毫秒）
    pub fn retry_interval_ms(mut self, interval: u64) -> Self {
        self.retry_interval_ms = Some(interval);
        self
    }

    /// 设置数据库连接地址
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// 添加一个透传给连接工厂的连接属性
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// 构建连接池配置
    ///
    /// # 错误
    ///
    /// 必需的配置项未设置或配置不合理时返回 `ConfigError`
    pub fn build(self) -> QuickPoolResult<PoolConfig> {
        let min_connections = self
            .min_connections
            .ok_or_else(|| crate::quick_error!(config, "最小连接数必须设置"))?;

        let max_connections = self
            .max_connections
            .ok_or_else(|| crate::quick_error!(config, "最大连接数必须设置"))?;

        let validate_timeout_secs = self
            .validate_timeout_secs
            .ok_or_else(|| crate::quick_error!(config, "连接校验超时时间必须设置"))?;

        let connect_timeout_secs = self
            .connect_timeout_secs
            .ok_or_else(|| crate::quick_error!(config, "获取连接超时时间必须设置"))?;

        let cache_limit_size = self
            .cache_limit_size
            .ok_or_else(|| crate::quick_error!(config, "语句缓存容量必须设置"))?;

        let test_on_borrow = self
            .test_on_borrow
            .ok_or_else(|| crate::quick_error!(config, "借出校验选项必须设置"))?;

        let test_on_return = self
            .test_on_return
            .ok_or_else(|| crate::quick_error!(config, "归还校验选项必须设置"))?;

        let retry_limit = self
            .retry_limit
            .ok_or_else(|| crate::quick_error!(config, "最大重试次数必须设置"))?;

        let url = self
            .url
            .ok_or_else(|| crate::quick_error!(config, "数据库连接地址必须设置"))?;

        let config = PoolConfig {
            min_connections,
            max_connections,
            validate_timeout_secs,
            connect_timeout_secs,
            cache_limit_size,
            transactional: self.transactional.unwrap_or(false),
            test_on_borrow,
            test_on_return,
            retry_limit,
            retry_interval_ms: self
                .retry_interval_ms
                .unwrap_or(PoolConfig::default().retry_interval_ms),
            url,
            properties: self.properties,
            username: self.username.unwrap_or_default(),
            password: self.password.unwrap_or_default(),
        };
        config.validate()?;

        info!(
            "创建连接池配置: 最小连接数={}, 最大连接数={}, 获取超时={}s, 语句缓存={}",
            min_connections, max_connections, connect_timeout_secs, cache_limit_size
        );
        Ok(config)
    }
}
