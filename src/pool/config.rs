//! 连接池运行时参数模块
//!
//! 构造时从 [`PoolConfig`] 拷贝，之后可通过管理接口在运行时修改

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, Ordering};

use crate::types::{Credentials, PoolConfig};

/// 可在运行时修改的连接池参数
#[derive(Debug)]
pub struct PoolSettings {
    /// 最小连接数
    min_connections: AtomicU32,
    /// 最大连接数
    max_connections: AtomicU32,
    /// 校验超时（秒）
    validate_timeout_secs: AtomicU64,
    /// 获取连接超时（秒）
    connect_timeout_secs: AtomicU64,
    /// 新建连接的语句缓存容量
    cache_limit_size: AtomicI32,
    /// 补充任务最大重试次数
    retry_limit: AtomicU32,
    /// 补充任务重试间隔（毫秒）
    retry_interval_ms: AtomicU64,
    /// 连接凭据
    credentials: ArcSwap<Credentials>,
}

impl PoolSettings {
    pub fn from_config(config: &PoolConfig) -> Self {
        Self {
            min_connections: AtomicU32::new(config.min_connections),
            max_connections: AtomicU32::new(config.max_connections),
            validate_timeout_secs: AtomicU64::new(config.validate_timeout_secs),
            connect_timeout_secs: AtomicU64::new(config.connect_timeout_secs),
            cache_limit_size: AtomicI32::new(config.cache_limit_size),
            retry_limit: AtomicU32::new(config.retry_limit),
            retry_interval_ms: AtomicU64::new(config.retry_interval_ms),
            credentials: ArcSwap::from_pointee(config.credentials()),
        }
    }

    pub fn min_connections(&self) -> usize {
        self.min_connections.load(Ordering::SeqCst) as usize
    }

    pub fn set_min_connections(&self, value: u32) {
        self.min_connections.store(value, Ordering::SeqCst);
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections.load(Ordering::SeqCst) as usize
    }

    pub fn set_max_connections(&self, value: u32) {
        self.max_connections.store(value, Ordering::SeqCst);
    }

    pub fn validate_timeout_secs(&self) -> u64 {
        self.validate_timeout_secs.load(Ordering::SeqCst)
    }

    pub fn set_validate_timeout_secs(&self, value: u64) {
        self.validate_timeout_secs.store(value, Ordering::SeqCst);
    }

    pub fn connect_timeout_secs(&self) -> u64 {
        self.connect_timeout_secs.load(Ordering::SeqCst)
    }

    pub fn set_connect_timeout_secs(&self, value: u64) {
        self.connect_timeout_secs.store(value, Ordering::SeqCst);
    }

    pub fn cache_limit_size(&self) -> i32 {
        self.cache_limit_size.load(Ordering::SeqCst)
    }

    pub fn set_cache_limit_size(&self, value: i32) {
        self.cache_limit_size.store(value, Ordering::SeqCst);
    }

    pub fn retry_limit(&self) -> u32 {
        self.retry_limit.load(Ordering::SeqCst)
    }

    pub fn set_retry_limit(&self, value: u32) {
        self.retry_limit.store(value, Ordering::SeqCst);
    }

    pub fn retry_interval_ms(&self) -> u64 {
        self.retry_interval_ms.load(Ordering::SeqCst)
    }

    pub fn credentials(&self) -> Arc<Credentials> {
        self.credentials.load_full()
    }

    pub fn set_username(&self, username: &str) {
        self.credentials.rcu(|current| Credentials {
            username: username.to_string(),
            password: current.password.clone(),
        });
    }

    pub fn set_password(&self, password: &str) {
        self.credentials.rcu(|current| Credentials {
            username: current.username.clone(),
            password: password.to_string(),
        });
    }

    pub fn set_credentials(&self, credentials: Credentials) {
        self.credentials.store(Arc::new(credentials));
    }

    /// 生成调用连接工厂时使用的连接属性
    pub fn connect_properties(&self, base: &HashMap<String, String>) -> HashMap<String, String> {
        let mut properties = base.clone();
        self.credentials.load().apply_to(&mut properties);
        properties
    }
}
