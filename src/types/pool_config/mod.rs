use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::QuickPoolResult;

/// 连接池配置
///
/// 构造连接池时使用的全部参数。除连接属性与凭据外，
/// 所有字段在配置文件中都必须显式给出。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// 最小连接数，同时也是空闲队列的容量上限
    pub min_connections: u32,
    /// 最大连接数（活跃 + 空闲）
    pub max_connections: u32,
    /// 连接校验超时时间（秒），0 表示不限制
    pub validate_timeout_secs: u64,
    /// 获取连接超时时间（秒）
    pub connect_timeout_secs: u64,
    /// 每个连接的语句缓存容量，小于等于 0 表示禁用语句缓存
    pub cache_limit_size: i32,
    /// 是否为事务型连接池，归还时会重置事务隔离级别
    pub transactional: bool,
    /// 借出时校验连接
    pub test_on_borrow: bool,
    /// 归还时校验连接
    pub test_on_return: bool,
    /// 后台补充任务单次运行的最大重试次数
    pub retry_limit: u32,
    /// 后台补充任务重试间隔（毫秒）
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    /// 数据库连接地址
    pub url: String,
    /// 透传给连接工厂的连接属性
    #[serde(default)]
    pub properties: HashMap<String, String>,
    /// 用户名
    #[serde(default)]
    pub username: String,
    /// 密码
    #[serde(default)]
    pub password: String,
}

fn default_retry_interval_ms() -> u64 {
    1000
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 1,
            max_connections: 10,
            validate_timeout_secs: 5,
            connect_timeout_secs: 30,
            cache_limit_size: 32,
            transactional: false,
            test_on_borrow: true,
            test_on_return: true,
            retry_limit: 3,
            retry_interval_ms: default_retry_interval_ms(),
            url: String::new(),
            properties: HashMap::new(),
            username: String::new(),
            password: String::new(),
        }
    }
}

impl PoolConfig {
    /// 校验配置的合理性
    pub fn validate(&self) -> QuickPoolResult<()> {
        if self.url.trim().is_empty() {
            return Err(crate::quick_error!(config, "数据库连接地址不能为空"));
        }
        if self.max_connections == 0 {
            return Err(crate::quick_error!(config, "最大连接数不能为零"));
        }
        if self.min_connections > self.max_connections {
            return Err(crate::quick_error!(config, "最小连接数不能大于最大连接数"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(crate::quick_error!(config, "获取连接超时时间不能为零"));
        }
        Ok(())
    }

    /// 获取凭据
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

/// 连接凭据
///
/// 运行时可以替换，在下一次调用连接工厂时生效
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"******")
            .finish()
    }
}

impl Credentials {
    /// 将凭据合并到连接属性中
    ///
    /// 用户名非空时写入 `user`，仅在用户名存在且密码非空时写入 `password`
    pub fn apply_to(&self, properties: &mut HashMap<String, String>) {
        if self.username.trim().is_empty() {
            return;
        }
        properties.insert("user".to_string(), self.username.clone());
        if !self.password.trim().is_empty() {
            properties.insert("password".to_string(), self.password.clone());
        }
    }
}
