//! 空闲连接补充任务模块
//!
//! 补充任务把空闲连接数补到最小连接数，每轮开始前先巡检现有空闲连接。
//! 监视器每秒检查一次，上一轮任务结束后启动新一轮。

use parking_lot::Mutex as SyncMutex;
use rat_logger::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::pool::PoolInner;

/// 监视器检查周期
pub(crate) const SUPERVISE_PERIOD: Duration = Duration::from_secs(1);

/// 补充任务停止信号
#[derive(Debug, Default)]
pub(crate) struct WorkerControl {
    stopped: AtomicBool,
    wakeup: Notify,
}

impl WorkerControl {
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub(crate) fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.wakeup.notify_waiters();
        self.wakeup.notify_one();
    }

    /// 可被停止信号打断的等待，返回是否应继续运行
    async fn wait(&self, duration: Duration) -> bool {
        if self.is_stopped() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_stopped(),
            _ = self.wakeup.notified() => false,
        }
    }
}

/// 补充空闲连接的后台任务
pub(crate) struct ReplenishWorker {
    pool: Arc<PoolInner>,
    control: Arc<WorkerControl>,
}

impl ReplenishWorker {
    pub(crate) fn new(pool: Arc<PoolInner>, control: Arc<WorkerControl>) -> Self {
        Self { pool, control }
    }

    /// 执行一轮补充
    ///
    /// 已达最大连接数时直接结束；否则巡检空闲连接后逐个新建，
    /// 连续失败达到重试上限后结束本轮，等待监视器启动下一轮。
    pub(crate) async fn run(self) {
        let pool = &self.pool;
        if self.control.is_stopped() || pool.admission_limited() {
            crate::debug_log!("连接数已达上限或任务已停止，跳过本轮补充");
            return;
        }

        pool.sweep_idle().await;

        let mut retry_count: u32 = 0;
        let mut created: usize = 0;
        loop {
            if self.control.is_stopped() {
                break;
            }
            let Some(slot) = pool.reserve_replenish_slot() else {
                break;
            };
            match pool.open_idle_connection(slot).await {
                Ok(()) => created += 1,
                Err(e) => {
                    retry_count += 1;
                    let retry_limit = pool.settings.retry_limit();
                    warn!(
                        "补充空闲连接失败 ({}/{}): {}",
                        retry_count, retry_limit, e
                    );
                    if retry_count >= retry_limit {
                        warn!("补充空闲连接达到重试上限，本轮结束");
                        break;
                    }
                    let interval = Duration::from_millis(pool.settings.retry_interval_ms());
                    if !self.control.wait(interval).await {
                        break;
                    }
                }
            }
        }

        if created > 0 {
            debug!("本轮补充空闲连接数: {}", created);
        }
    }
}

/// 补充任务监视器
///
/// 只持有连接池的弱引用，连接池释放后自行退出
pub(crate) struct WorkerSupervisor {
    control: Arc<WorkerControl>,
    worker: Arc<SyncMutex<Option<JoinHandle<()>>>>,
    monitor: JoinHandle<()>,
}

impl WorkerSupervisor {
    /// 立即启动第一轮补充任务及其监视器
    pub(crate) fn start(pool: &Arc<PoolInner>) -> Self {
        let control = Arc::new(WorkerControl::default());
        let first = tokio::spawn(
            ReplenishWorker::new(Arc::clone(pool), Arc::clone(&control)).run(),
        );
        let worker = Arc::new(SyncMutex::new(Some(first)));
        let monitor = tokio::spawn(Self::supervise(
            Arc::downgrade(pool),
            Arc::clone(&control),
            Arc::clone(&worker),
        ));
        debug!("补充任务监视器已启动");
        Self {
            control,
            worker,
            monitor,
        }
    }

    async fn supervise(
        pool: Weak<PoolInner>,
        control: Arc<WorkerControl>,
        worker: Arc<SyncMutex<Option<JoinHandle<()>>>>,
    ) {
        let mut ticker = tokio::time::interval(SUPERVISE_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if control.is_stopped() {
                break;
            }
            let Some(strong) = pool.upgrade() else {
                break;
            };
            let mut current = worker.lock();
            let finished = current.as_ref().map_or(true, |handle| handle.is_finished());
            if finished {
                *current = Some(tokio::spawn(
                    ReplenishWorker::new(strong, Arc::clone(&control)).run(),
                ));
            }
        }
        debug!("补充任务监视器已退出");
    }

    /// 当前一轮补充任务是否仍在运行
    pub(crate) fn is_worker_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// 停止监视器并通知补充任务退出
    ///
    /// 正在进行的补充任务不会被中止，它在下一个检查点观察到停止信号后退出
    pub(crate) fn stop(&self) {
        self.control.stop();
        self.monitor.abort();
    }
}
