//! 连接池核心模块
//!
//! 空闲队列、活跃集合、占位计数与关闭标志由同一把锁保护，
//! 获取、归还、巡检、关闭四条路径使用一致的加锁粒度，且从不持锁跨越 `.await`。
//! 获取连接按到达顺序串行执行，等待通过 [`Notify`] 唤醒而不是忙等。

use parking_lot::Mutex as SyncMutex;
use rat_logger::{debug, error, info, warn};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use uuid::Uuid;

use super::{
    ConnectionFactory, PoolConnection, PoolSettings, PoolStats, PooledConnection,
    WorkerSupervisor,
};
use crate::error::{QuickPoolError, QuickPoolResult};
use crate::types::{Credentials, PoolConfig};

/// 创建连接失败后，获取者再次尝试前的等待间隔
const ACQUIRE_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// 受锁保护的连接池状态
#[derive(Default)]
struct PoolState {
    /// 空闲队列，队首为最近归还的连接
    idle: VecDeque<Arc<PooledConnection>>,
    /// 活跃集合
    active: HashMap<Uuid, Arc<PooledConnection>>,
    /// 已计入容量但正在创建、校验或重置中的连接数
    pending: usize,
    /// 关闭标志，只会从 false 变为 true
    closed: bool,
}

impl PoolState {
    fn total(&self) -> usize {
        self.idle.len() + self.active.len() + self.pending
    }
}

/// 容量占位
///
/// 连接离开空闲队列/活跃集合、尚未落到新位置期间持有，
/// 保证 `活跃 + 空闲 + 占位 ≤ 最大连接数`。被丢弃时自动归还占位并唤醒等待者。
pub(crate) struct PendingSlot<'a> {
    pool: &'a PoolInner,
    armed: bool,
}

impl<'a> PendingSlot<'a> {
    fn reserve(pool: &'a PoolInner, state: &mut PoolState) -> Self {
        state.pending += 1;
        Self { pool, armed: true }
    }

    /// 在已持有的锁内结算占位
    fn settle(mut self, state: &mut PoolState) {
        state.pending = state.pending.saturating_sub(1);
        self.armed = false;
    }
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        if self.armed {
            {
                let mut state = self.pool.state.lock();
                state.pending = state.pending.saturating_sub(1);
            }
            self.pool.available.notify_one();
        }
    }
}

/// 等待计数守卫
struct WaitGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> WaitGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 单次获取尝试的结果
enum Attempt<'a> {
    /// 得到候选连接（来自空闲队列或新建）
    Ready(Arc<PooledConnection>, PendingSlot<'a>, bool),
    /// 允许新建但连接工厂失败
    CreateFailed,
    /// 空闲队列为空且已达最大连接数
    Exhausted,
    /// 连接池已关闭
    Closed,
}

enum Candidate<'a> {
    Idle(Arc<PooledConnection>, PendingSlot<'a>),
    Create(PendingSlot<'a>),
    Exhausted,
    Closed,
}

/// 连接池内部共享状态
pub(crate) struct PoolInner {
    pub(crate) settings: PoolSettings,
    transactional: bool,
    test_on_borrow: bool,
    test_on_return: bool,
    url: String,
    properties: HashMap<String, String>,
    factory: Arc<dyn ConnectionFactory>,
    state: SyncMutex<PoolState>,
    wait_count: AtomicUsize,
    acquire_gate: Mutex<()>,
    available: Notify,
    supervisor: SyncMutex<Option<WorkerSupervisor>>,
}

impl PoolInner {
    fn closed_error(&self) -> QuickPoolError {
        QuickPoolError::PoolClosed {
            message: crate::i18n::t("error.pool_closed"),
        }
    }

    fn timeout_error(&self, timeout_secs: u64) -> QuickPoolError {
        QuickPoolError::AcquireTimeout {
            message: crate::i18n::tf(
                "error.acquire_timeout",
                &[("timeout", &timeout_secs.to_string())],
            ),
            timeout_secs,
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// 是否已达最大连接数
    pub(crate) fn admission_limited(&self) -> bool {
        let max = self.settings.max_connections();
        self.state.lock().total() >= max
    }

    /// 是否需要补充空闲连接
    pub(crate) fn needs_replenishment(&self) -> bool {
        let min = self.settings.min_connections();
        let max = self.settings.max_connections();
        let state = self.state.lock();
        !state.closed && state.total() < max && state.idle.len() < min
    }

    /// 为补充任务预留容量
    pub(crate) fn reserve_replenish_slot(&self) -> Option<PendingSlot<'_>> {
        let min = self.settings.min_connections();
        let max = self.settings.max_connections();
        let mut state = self.state.lock();
        if state.closed || state.total() >= max || state.idle.len() >= min {
            return None;
        }
        Some(PendingSlot::reserve(self, &mut state))
    }

    fn take_candidate(&self) -> Candidate<'_> {
        let max = self.settings.max_connections();
        let mut state = self.state.lock();
        if state.closed {
            return Candidate::Closed;
        }
        if let Some(connection) = state.idle.pop_front() {
            let slot = PendingSlot::reserve(self, &mut state);
            return Candidate::Idle(connection, slot);
        }
        if state.total() < max {
            return Candidate::Create(PendingSlot::reserve(self, &mut state));
        }
        Candidate::Exhausted
    }

    /// 取得下一个候选连接，新建连接不会越过获取截止时间
    async fn next_attempt(&self, deadline: Instant) -> Attempt<'_> {
        match self.take_candidate() {
            Candidate::Idle(connection, slot) => Attempt::Ready(connection, slot, false),
            Candidate::Create(slot) => {
                match tokio::time::timeout_at(deadline, self.create_connection()).await {
                    Ok(Ok(connection)) => Attempt::Ready(connection, slot, true),
                    Ok(Err(_)) => Attempt::CreateFailed,
                    Err(_) => {
                        warn!("创建数据库连接超过获取截止时间: url={}", self.url);
                        Attempt::CreateFailed
                    }
                }
            }
            Candidate::Exhausted => Attempt::Exhausted,
            Candidate::Closed => Attempt::Closed,
        }
    }

    /// 通过连接工厂打开新连接
    pub(crate) async fn create_connection(&self) -> QuickPoolResult<Arc<PooledConnection>> {
        let properties = self.settings.connect_properties(&self.properties);
        match self.factory.open(&self.url, &properties).await {
            Ok(raw) => {
                let connection = Arc::new(PooledConnection::new(
                    raw,
                    self.transactional,
                    self.settings.cache_limit_size(),
                ));
                debug!("创建数据库连接成功: id={}", connection.id());
                Ok(connection)
            }
            Err(e) => {
                error!("创建数据库连接失败: url={}", self.url);
                debug!("连接工厂错误详情: {}", e);
                Err(crate::quick_error!(
                    connection,
                    crate::i18n::tf("error.connection_open", &[("message", &e.to_string())])
                ))
            }
        }
    }

    /// 校验连接，未通过时立即销毁
    pub(crate) async fn check_connection(&self, connection: &PooledConnection) -> bool {
        let valid = connection
            .validate(self.settings.validate_timeout_secs())
            .await;
        if !valid {
            debug!(
                "{}",
                crate::i18n::tf(
                    "error.connection_invalid",
                    &[("id", &connection.id().to_string())]
                )
            );
            self.destroy_connection(connection).await;
        }
        valid
    }

    /// 借出前在截止时间内校验连接
    ///
    /// 超过截止时间视为校验失败。未通过的候选连接在后台销毁，不再占用获取者的时间
    async fn check_before_deadline(
        &self,
        connection: &Arc<PooledConnection>,
        deadline: Instant,
    ) -> bool {
        let validate = connection.validate(self.settings.validate_timeout_secs());
        let valid = match tokio::time::timeout_at(deadline, validate).await {
            Ok(valid) => valid,
            Err(_) => {
                warn!("借出校验超过获取截止时间: id={}", connection.id());
                false
            }
        };
        if !valid {
            debug!(
                "{}",
                crate::i18n::tf(
                    "error.connection_invalid",
                    &[("id", &connection.id().to_string())]
                )
            );
            let connection = Arc::clone(connection);
            tokio::spawn(async move {
                if let Err(e) = connection.destroy().await {
                    error!("关闭数据库连接失败: id={}", connection.id());
                    debug!("关闭连接错误详情: {}", e);
                }
            });
        }
        valid
    }

    /// 销毁连接，关闭失败只记录日志
    pub(crate) async fn destroy_connection(&self, connection: &PooledConnection) {
        if connection.is_closed() {
            return;
        }
        if let Err(e) = connection.destroy().await {
            error!("关闭数据库连接失败: id={}", connection.id());
            debug!("关闭连接错误详情: {}", e);
        }
    }

    /// 尝试放入空闲队列
    ///
    /// 仅当空闲连接数小于最小连接数时接纳，否则销毁。
    /// `reset` 为 true 时在入队前重置连接状态，重置失败同样销毁。
    pub(crate) async fn admit_idle(
        &self,
        connection: Arc<PooledConnection>,
        slot: PendingSlot<'_>,
        reset: bool,
    ) -> bool {
        let min = self.settings.min_connections();
        let has_room = {
            let state = self.state.lock();
            !state.closed && state.idle.len() < min
        };
        if !has_room {
            debug!("空闲队列已满，销毁连接: id={}", connection.id());
            drop(slot);
            self.destroy_connection(&connection).await;
            return false;
        }

        if reset {
            if let Err(e) = connection.reset().await {
                warn!("重置连接失败，销毁连接: id={}, 错误={}", connection.id(), e);
                drop(slot);
                self.destroy_connection(&connection).await;
                return false;
            }
        }

        let rejected = {
            let mut state = self.state.lock();
            slot.settle(&mut state);
            if !state.closed && state.idle.len() < min {
                if reset {
                    state.idle.push_front(Arc::clone(&connection));
                } else {
                    state.idle.push_back(Arc::clone(&connection));
                }
                None
            } else {
                Some(connection)
            }
        };
        self.available.notify_one();

        match rejected {
            Some(connection) => {
                debug!("空闲队列已满，销毁连接: id={}", connection.id());
                self.destroy_connection(&connection).await;
                false
            }
            None => true,
        }
    }

    /// 打开一个新连接并放入空闲队列
    pub(crate) async fn open_idle_connection(&self, slot: PendingSlot<'_>) -> QuickPoolResult<()> {
        let connection = self.create_connection().await?;
        if self.test_on_borrow
            && !connection
                .validate(self.settings.validate_timeout_secs())
                .await
        {
            drop(slot);
            self.destroy_connection(&connection).await;
            return Err(crate::quick_error!(
                validation,
                crate::i18n::tf(
                    "error.connection_invalid",
                    &[("id", &connection.id().to_string())]
                )
            ));
        }
        self.admit_idle(connection, slot, false).await;
        Ok(())
    }

    /// 巡检空闲连接
    ///
    /// 逐个校验当前空闲连接，未通过且仍在空闲队列中的连接被移出并销毁
    pub(crate) async fn sweep_idle(&self) {
        let snapshot: Vec<Arc<PooledConnection>> = {
            let state = self.state.lock();
            state.idle.iter().cloned().collect()
        };
        let timeout_secs = self.settings.validate_timeout_secs();
        for connection in snapshot {
            if connection.validate(timeout_secs).await {
                continue;
            }
            let removed = {
                let mut state = self.state.lock();
                let before = state.idle.len();
                state.idle.retain(|idle| idle.id() != connection.id());
                state.idle.len() != before
            };
            if removed {
                debug!("空闲连接巡检未通过，销毁连接: id={}", connection.id());
                self.destroy_connection(&connection).await;
                self.available.notify_one();
            }
        }
    }

    fn activate(
        &self,
        connection: Arc<PooledConnection>,
        slot: PendingSlot<'_>,
    ) -> Result<Arc<PooledConnection>, Arc<PooledConnection>> {
        let mut state = self.state.lock();
        slot.settle(&mut state);
        if state.closed {
            return Err(connection);
        }
        state
            .active
            .insert(connection.id(), Arc::clone(&connection));
        Ok(connection)
    }

    /// 归还连接
    pub(crate) async fn release(&self, connection: Arc<PooledConnection>) {
        let slot = {
            let mut state = self.state.lock();
            let tracked = state.active.remove(&connection.id()).is_some();
            if state.closed || !tracked {
                None
            } else {
                Some(PendingSlot::reserve(self, &mut state))
            }
        };

        let Some(slot) = slot else {
            debug!("连接池已关闭或连接未被借出，直接销毁: id={}", connection.id());
            self.destroy_connection(&connection).await;
            self.available.notify_one();
            return;
        };

        if connection.is_closed() {
            return;
        }

        if self.test_on_return && !self.check_connection(&connection).await {
            debug!("归还校验未通过，已销毁连接: id={}", connection.id());
            return;
        }

        self.admit_idle(connection, slot, true).await;
    }

    /// 不经异步归还直接把连接移出活跃集合
    pub(crate) fn forget(&self, connection: &PooledConnection) {
        {
            let mut state = self.state.lock();
            state.active.remove(&connection.id());
        }
        self.available.notify_one();
    }

    fn snapshot(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            idle_count: state.idle.len(),
            active_count: state.active.len(),
            pending_count: state.pending,
            wait_count: self.wait_count.load(Ordering::SeqCst),
            closed: state.closed,
            min_connections: self.settings.min_connections(),
            max_connections: self.settings.max_connections(),
            cache_limit_size: self.settings.cache_limit_size(),
        }
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        if let Some(supervisor) = self.supervisor.get_mut().take() {
            supervisor.stop();
        }
        if !self.state.get_mut().closed {
            warn!("连接池未调用close()即被释放，剩余连接将直接丢弃");
        }
    }
}

/// 数据库连接池
///
/// 维护有界的可复用连接集合，并为每个连接维护有界的语句缓存。
/// 克隆开销很小，所有克隆共享同一个连接池。
#[derive(Clone)]
pub struct QuickPool {
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for QuickPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuickPool")
            .field("url", &self.inner.url)
            .field("stats", &self.inner.snapshot())
            .finish()
    }
}

impl QuickPool {
    /// 使用配置创建连接池
    ///
    /// 创建后立即启动后台补充任务及其监视器，因此必须在tokio运行时中调用
    pub async fn with_config(
        config: PoolConfig,
        factory: Arc<dyn ConnectionFactory>,
    ) -> QuickPoolResult<Self> {
        crate::init();
        config.validate()?;

        let inner = Arc::new(PoolInner {
            settings: PoolSettings::from_config(&config),
            transactional: config.transactional,
            test_on_borrow: config.test_on_borrow,
            test_on_return: config.test_on_return,
            url: config.url.clone(),
            properties: config.properties.clone(),
            factory,
            state: SyncMutex::new(PoolState::default()),
            wait_count: AtomicUsize::new(0),
            acquire_gate: Mutex::new(()),
            available: Notify::new(),
            supervisor: SyncMutex::new(None),
        });

        let supervisor = WorkerSupervisor::start(&inner);
        *inner.supervisor.lock() = Some(supervisor);

        info!(
            "连接池已创建: url={}, 最小连接数={}, 最大连接数={}, 语句缓存={}",
            config.url, config.min_connections, config.max_connections, config.cache_limit_size
        );
        Ok(Self { inner })
    }

    /// 获取连接
    ///
    /// 依次尝试空闲队列与新建连接，启用借出校验时校验候选连接，
    /// 在获取超时时间内无法得到可用连接时返回 `AcquireTimeout`。
    pub async fn acquire(&self) -> QuickPoolResult<PoolConnection> {
        let inner = &self.inner;
        if inner.is_closed() {
            return Err(inner.closed_error());
        }

        let timeout_secs = inner.settings.connect_timeout_secs();
        let begin = Instant::now();
        let deadline = begin + Duration::from_secs(timeout_secs);
        crate::debug_log!(
            "等待获取连接的调用者数: {}",
            inner.wait_count.load(Ordering::SeqCst)
        );

        let _gate = match tokio::time::timeout_at(deadline, inner.acquire_gate.lock()).await {
            Ok(gate) => gate,
            Err(_) => return Err(inner.timeout_error(timeout_secs)),
        };

        let mut waiting: Option<WaitGuard<'_>> = None;
        let outcome = loop {
            match inner.next_attempt(deadline).await {
                Attempt::Closed => break Err(inner.closed_error()),
                Attempt::Ready(connection, slot, created) => {
                    if inner.test_on_borrow
                        && !inner.check_before_deadline(&connection, deadline).await
                    {
                        drop(slot);
                        if Instant::now() >= deadline {
                            break Err(inner.timeout_error(timeout_secs));
                        }
                        continue;
                    }
                    match inner.activate(connection, slot) {
                        Ok(connection) => break Ok((connection, created)),
                        Err(connection) => {
                            inner.destroy_connection(&connection).await;
                            break Err(inner.closed_error());
                        }
                    }
                }
                Attempt::CreateFailed => {
                    if waiting.is_none() {
                        waiting = Some(WaitGuard::enter(&inner.wait_count));
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        break Err(inner.timeout_error(timeout_secs));
                    }
                    tokio::time::sleep_until(deadline.min(now + ACQUIRE_RETRY_INTERVAL)).await;
                }
                Attempt::Exhausted => {
                    if waiting.is_none() {
                        waiting = Some(WaitGuard::enter(&inner.wait_count));
                    }
                    if tokio::time::timeout_at(deadline, inner.available.notified())
                        .await
                        .is_err()
                    {
                        break Err(inner.timeout_error(timeout_secs));
                    }
                }
            }
        };
        let waited = waiting.is_some();
        drop(waiting);

        let (connection, created) = match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!("获取连接失败: {}", e);
                return Err(e);
            }
        };

        connection.touch();
        debug!(
            "获取连接成功: id={}, 来源={}, 耗时={}ms, 曾等待={}",
            connection.id(),
            if created { "新建" } else { "连接池" },
            begin.elapsed().as_millis(),
            waited
        );
        crate::debug_log!(
            "连接池状态: 活跃={}, 空闲={}",
            self.active_count(),
            self.idle_count()
        );
        Ok(PoolConnection::new(connection, Arc::clone(&self.inner)))
    }

    /// 替换凭据后获取连接
    ///
    /// 新凭据在下一次调用连接工厂时生效，已有的空闲连接不受影响
    pub async fn acquire_with_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> QuickPoolResult<PoolConnection> {
        self.inner.settings.set_credentials(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        });
        self.acquire().await
    }

    /// 归还连接，等价于 [`PoolConnection::close`]
    pub async fn release(&self, connection: PoolConnection) {
        connection.close().await;
    }

    /// 关闭连接池
    ///
    /// 停止后台补充任务，销毁全部活跃与空闲连接。之后的获取请求一律失败。
    pub async fn close(&self) {
        let (active, idle) = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            let active: Vec<Arc<PooledConnection>> =
                state.active.drain().map(|(_, connection)| connection).collect();
            let idle: Vec<Arc<PooledConnection>> = state.idle.drain(..).collect();
            (active, idle)
        };

        let supervisor = self.inner.supervisor.lock().take();
        if let Some(supervisor) = supervisor {
            supervisor.stop();
        }
        self.inner.available.notify_waiters();
        self.inner.available.notify_one();

        info!(
            "关闭连接池: 活跃连接={}, 空闲连接={}",
            active.len(),
            idle.len()
        );
        let inner = &self.inner;
        futures::future::join_all(
            active
                .iter()
                .chain(idle.iter())
                .map(|connection| inner.destroy_connection(connection)),
        )
        .await;
    }

    /// 巡检空闲连接，销毁校验未通过的连接
    pub async fn sweep_idle(&self) {
        self.inner.sweep_idle().await;
    }

    /// 是否需要补充空闲连接
    pub fn needs_replenishment(&self) -> bool {
        self.inner.needs_replenishment()
    }

    /// 空闲连接数
    pub fn idle_count(&self) -> usize {
        self.inner.state.lock().idle.len()
    }

    /// 活跃连接数
    pub fn active_count(&self) -> usize {
        self.inner.state.lock().active.len()
    }

    /// 正在等待获取连接的调用者数
    pub fn wait_count(&self) -> usize {
        self.inner.wait_count.load(Ordering::SeqCst)
    }

    /// 是否已关闭
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// 后台补充任务是否正在运行
    pub fn is_replenishing(&self) -> bool {
        self.inner
            .supervisor
            .lock()
            .as_ref()
            .is_some_and(|supervisor| supervisor.is_worker_running())
    }

    /// 连接池状态快照
    pub fn stats(&self) -> PoolStats {
        self.inner.snapshot()
    }

    pub fn set_min_connections(&self, min_connections: u32) {
        self.inner.settings.set_min_connections(min_connections);
    }

    pub fn set_max_connections(&self, max_connections: u32) {
        self.inner.settings.set_max_connections(max_connections);
    }

    pub fn set_validate_timeout(&self, timeout_secs: u64) {
        self.inner.settings.set_validate_timeout_secs(timeout_secs);
    }

    pub fn set_connect_timeout(&self, timeout_secs: u64) {
        self.inner.settings.set_connect_timeout_secs(timeout_secs);
    }

    /// 设置语句缓存容量，只影响之后新建的连接
    pub fn set_cache_limit_size(&self, cache_limit_size: i32) {
        self.inner.settings.set_cache_limit_size(cache_limit_size);
    }

    pub fn set_retry_limit(&self, retry_limit: u32) {
        self.inner.settings.set_retry_limit(retry_limit);
    }

    /// 设置用户名，下一次调用连接工厂时生效
    pub fn set_username(&self, username: &str) {
        self.inner.settings.set_username(username);
    }

    /// 设置密码，下一次调用连接工厂时生效
    pub fn set_password(&self, password: &str) {
        self.inner.settings.set_password(password);
    }
}
