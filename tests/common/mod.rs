//! 集成测试共用的内存模拟驱动
//!
//! 连接工厂统计打开次数并可切换为失败模式，
//! 每个连接与语句的状态都保存在共享结构中供测试断言。

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rat_quickpool::{
    ConnectionFactory, PoolConfig, QuickPoolResult, RawConnection, RawStatement,
    StatementOptions, TransactionIsolation,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// 单个模拟连接的状态
#[derive(Debug)]
pub struct MockConnectionState {
    pub serial: usize,
    pub properties: HashMap<String, String>,
    pub valid: AtomicBool,
    pub closed: AtomicBool,
    pub auto_commit: AtomicBool,
    pub isolation: Mutex<TransactionIsolation>,
    pub prepared: AtomicUsize,
}

/// 单个模拟语句的状态
#[derive(Debug)]
pub struct MockStatementState {
    pub handle_id: u64,
    pub sql: String,
    pub closed: AtomicBool,
    pub cleared: AtomicUsize,
}

/// 模拟驱动的全局状态
#[derive(Debug, Default)]
pub struct MockDriver {
    pub opens: AtomicUsize,
    pub open_attempts: AtomicUsize,
    pub open_delay_ms: AtomicU64,
    pub validate_delay_ms: AtomicU64,
    pub fail_open: AtomicBool,
    pub invalid_on_open: AtomicBool,
    pub fail_prepare: AtomicBool,
    next_statement_id: AtomicU64,
    pub connections: Mutex<Vec<Arc<MockConnectionState>>>,
    pub statements: Mutex<Vec<Arc<MockStatementState>>>,
}

impl MockDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn factory(self: &Arc<Self>) -> Arc<dyn ConnectionFactory> {
        Arc::new(MockFactory {
            driver: Arc::clone(self),
        })
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn open_attempt_count(&self) -> usize {
        self.open_attempts.load(Ordering::SeqCst)
    }

    pub fn closed_connection_count(&self) -> usize {
        self.connections
            .lock()
            .iter()
            .filter(|c| c.closed.load(Ordering::SeqCst))
            .count()
    }

    pub fn open_connection_count(&self) -> usize {
        self.connections
            .lock()
            .iter()
            .filter(|c| !c.closed.load(Ordering::SeqCst))
            .count()
    }

    pub fn closed_statement_count(&self) -> usize {
        self.statements
            .lock()
            .iter()
            .filter(|s| s.closed.load(Ordering::SeqCst))
            .count()
    }

    pub fn statement(&self, handle_id: u64) -> Option<Arc<MockStatementState>> {
        self.statements
            .lock()
            .iter()
            .find(|s| s.handle_id == handle_id)
            .cloned()
    }

    /// 把已打开的全部连接标记为不可用
    pub fn invalidate_all(&self) {
        for connection in self.connections.lock().iter() {
            connection.valid.store(false, Ordering::SeqCst);
        }
    }

    fn new_statement(&self, sql: &str) -> MockStatement {
        let state = Arc::new(MockStatementState {
            handle_id: self.next_statement_id.fetch_add(1, Ordering::SeqCst) + 1,
            sql: sql.to_string(),
            closed: AtomicBool::new(false),
            cleared: AtomicUsize::new(0),
        });
        self.statements.lock().push(Arc::clone(&state));
        MockStatement { state }
    }
}

pub struct MockFactory {
    driver: Arc<MockDriver>,
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    async fn open(
        &self,
        url: &str,
        properties: &HashMap<String, String>,
    ) -> QuickPoolResult<Box<dyn RawConnection>> {
        self.driver.open_attempts.fetch_add(1, Ordering::SeqCst);
        let delay = self.driver.open_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.driver.fail_open.load(Ordering::SeqCst) {
            return Err(rat_quickpool::quick_error!(
                driver,
                format!("无法连接到 {}", url)
            ));
        }
        let serial = self.driver.opens.fetch_add(1, Ordering::SeqCst) + 1;
        let state = Arc::new(MockConnectionState {
            serial,
            properties: properties.clone(),
            valid: AtomicBool::new(!self.driver.invalid_on_open.load(Ordering::SeqCst)),
            closed: AtomicBool::new(false),
            auto_commit: AtomicBool::new(true),
            isolation: Mutex::new(TransactionIsolation::ReadCommitted),
            prepared: AtomicUsize::new(0),
        });
        self.driver.connections.lock().push(Arc::clone(&state));
        Ok(Box::new(MockConnection {
            state,
            driver: Arc::clone(&self.driver),
        }))
    }
}

pub struct MockConnection {
    pub state: Arc<MockConnectionState>,
    driver: Arc<MockDriver>,
}

#[async_trait]
impl RawConnection for MockConnection {
    async fn is_valid(&mut self, _timeout_secs: u64) -> QuickPoolResult<bool> {
        let delay = self.driver.validate_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(!self.state.closed.load(Ordering::SeqCst) && self.state.valid.load(Ordering::SeqCst))
    }

    async fn close(&mut self) -> QuickPoolResult<()> {
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> QuickPoolResult<()> {
        self.state.auto_commit.store(auto_commit, Ordering::SeqCst);
        Ok(())
    }

    async fn set_transaction_isolation(
        &mut self,
        level: TransactionIsolation,
    ) -> QuickPoolResult<()> {
        *self.state.isolation.lock() = level;
        Ok(())
    }

    async fn create_statement(&mut self) -> QuickPoolResult<Box<dyn RawStatement>> {
        Ok(Box::new(self.driver.new_statement("")))
    }

    async fn prepare_statement(
        &mut self,
        sql: &str,
        _options: &StatementOptions,
    ) -> QuickPoolResult<Box<dyn RawStatement>> {
        if self.driver.fail_prepare.load(Ordering::SeqCst) {
            return Err(rat_quickpool::quick_error!(driver, "语法错误"));
        }
        self.state.prepared.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.driver.new_statement(sql)))
    }

    async fn prepare_call(
        &mut self,
        sql: &str,
        options: &StatementOptions,
    ) -> QuickPoolResult<Box<dyn RawStatement>> {
        self.prepare_statement(sql, options).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub struct MockStatement {
    pub state: Arc<MockStatementState>,
}

impl MockStatement {
    pub fn handle_id(&self) -> u64 {
        self.state.handle_id
    }
}

#[async_trait]
impl RawStatement for MockStatement {
    async fn clear_batch(&mut self) -> QuickPoolResult<()> {
        self.state.cleared.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear_parameters(&mut self) -> QuickPoolResult<()> {
        Ok(())
    }

    async fn clear_warnings(&mut self) -> QuickPoolResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> QuickPoolResult<()> {
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// 测试用连接池配置
pub fn test_config(min_connections: u32, max_connections: u32) -> PoolConfig {
    PoolConfig {
        url: "mock://testdb".to_string(),
        min_connections,
        max_connections,
        validate_timeout_secs: 1,
        connect_timeout_secs: 1,
        cache_limit_size: 4,
        retry_limit: 3,
        retry_interval_ms: 50,
        ..PoolConfig::default()
    }
}

/// 轮询等待条件成立，超时返回 false
pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
