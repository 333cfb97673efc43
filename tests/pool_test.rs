//! 连接池集成测试

mod common;

use common::{MockConnection, MockDriver, test_config, wait_until};
use rand::Rng;
use rat_quickpool::{QuickPool, QuickPoolError, RawConnection, TransactionIsolation};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_replenish_to_min_connections() {
    let driver = MockDriver::new();
    let mut config = test_config(2, 10);
    config.retry_limit = 3;
    let pool = QuickPool::with_config(config, driver.factory()).await.unwrap();

    assert!(wait_until(Duration::from_secs(3), || pool.idle_count() == 2).await);
    assert_eq!(pool.active_count(), 0);
    assert_eq!(driver.open_count(), 2);
    assert!(!pool.needs_replenishment());

    pool.close().await;
}

#[tokio::test]
async fn test_release_then_acquire_reuses_connection() {
    let driver = MockDriver::new();
    let mut config = test_config(1, 1);
    config.test_on_return = false;
    let pool = QuickPool::with_config(config, driver.factory()).await.unwrap();

    let first = pool.acquire().await.unwrap();
    let first_id = first.id();
    assert_eq!(pool.active_count(), 1);
    first.close().await;
    assert_eq!(pool.active_count(), 0);
    assert_eq!(pool.idle_count(), 1);

    let second = pool.acquire().await.unwrap();
    assert_eq!(second.id(), first_id);
    assert_eq!(driver.open_count(), 1);

    pool.release(second).await;
    pool.close().await;
}

#[tokio::test]
async fn test_acquire_times_out_when_factory_fails() {
    let driver = MockDriver::new();
    driver.fail_open.store(true, Ordering::SeqCst);
    let pool = QuickPool::with_config(test_config(0, 2), driver.factory())
        .await
        .unwrap();

    let begin = Instant::now();
    let result = pool.acquire().await;
    let elapsed = begin.elapsed();

    match result {
        Err(QuickPoolError::AcquireTimeout { timeout_secs, .. }) => assert_eq!(timeout_secs, 1),
        other => panic!("应当获取超时: {:?}", other.map(|c| c.id())),
    }
    println!("获取超时耗时: {:?}", elapsed);
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_millis(1500));
    assert_eq!(pool.wait_count(), 0);
    assert_eq!(pool.stats().total_count(), 0);

    pool.close().await;
}

#[tokio::test]
async fn test_slow_failing_factory_bounded_by_deadline() {
    let driver = MockDriver::new();
    driver.fail_open.store(true, Ordering::SeqCst);
    driver.open_delay_ms.store(3000, Ordering::SeqCst);
    let pool = QuickPool::with_config(test_config(0, 2), driver.factory())
        .await
        .unwrap();

    let begin = Instant::now();
    let result = pool.acquire().await;
    let elapsed = begin.elapsed();

    assert!(matches!(result, Err(QuickPoolError::AcquireTimeout { .. })));
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_millis(1500));
    // 被取消的建连不再占用容量
    assert_eq!(pool.stats().total_count(), 0);
    assert_eq!(pool.wait_count(), 0);

    pool.close().await;
}

#[tokio::test]
async fn test_slow_validation_bounded_by_deadline() {
    let driver = MockDriver::new();
    let pool = QuickPool::with_config(test_config(1, 1), driver.factory())
        .await
        .unwrap();
    assert!(wait_until(Duration::from_secs(3), || pool.idle_count() == 1).await);

    driver.validate_delay_ms.store(3000, Ordering::SeqCst);
    let begin = Instant::now();
    let result = pool.acquire().await;
    let elapsed = begin.elapsed();

    assert!(matches!(result, Err(QuickPoolError::AcquireTimeout { .. })));
    assert!(elapsed < Duration::from_millis(1500));
    assert!(wait_until(Duration::from_secs(2), || driver.closed_connection_count() >= 1).await);

    pool.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_waiter_served_after_release() {
    let driver = MockDriver::new();
    let mut config = test_config(0, 1);
    config.connect_timeout_secs = 3;
    let pool = QuickPool::with_config(config, driver.factory()).await.unwrap();

    let held = pool.acquire().await.unwrap();
    let waiter_pool = pool.clone();
    let waiter = tokio::spawn(async move { waiter_pool.acquire().await.map(|c| c.id()) });

    assert!(wait_until(Duration::from_secs(2), || pool.wait_count() == 1).await);
    held.close().await;

    let served = waiter.await.unwrap();
    assert!(served.is_ok());
    assert_eq!(pool.wait_count(), 0);
    assert!(pool.active_count() + pool.idle_count() <= 1);

    pool.close().await;
}

#[tokio::test]
async fn test_exhausted_pool_times_out() {
    let driver = MockDriver::new();
    let pool = QuickPool::with_config(test_config(0, 1), driver.factory())
        .await
        .unwrap();

    let held = pool.acquire().await.unwrap();
    let begin = Instant::now();
    let result = pool.acquire().await;
    assert!(matches!(result, Err(QuickPoolError::AcquireTimeout { .. })));
    assert!(begin.elapsed() >= Duration::from_secs(1));
    assert_eq!(driver.open_count(), 1);

    held.close().await;
    pool.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_bounds_hold_under_concurrent_load() {
    let driver = MockDriver::new();
    let pool = QuickPool::with_config(test_config(2, 10), driver.factory())
        .await
        .unwrap();

    let violated = Arc::new(AtomicBool::new(false));
    let stop = Arc::new(AtomicBool::new(false));
    let monitor = {
        let pool = pool.clone();
        let violated = Arc::clone(&violated);
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            while !stop.load(Ordering::SeqCst) {
                let stats = pool.stats();
                if stats.active_count + stats.idle_count > 10 || stats.idle_count > 2 {
                    violated.store(true, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
    };

    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut tasks = Vec::new();
    for _ in 0..15 {
        let pool = pool.clone();
        let current = Arc::clone(&current);
        let peak = Arc::clone(&peak);
        tasks.push(tokio::spawn(async move {
            let hold_ms: u64 = rand::thread_rng().gen_range(0..1500);
            match pool.acquire().await {
                Ok(connection) => {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(hold_ms)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    connection.close().await;
                    true
                }
                Err(QuickPoolError::AcquireTimeout { .. }) => false,
                Err(e) => panic!("意外的错误: {}", e),
            }
        }));
    }

    let mut served = 0;
    for task in tasks {
        if task.await.unwrap() {
            served += 1;
        }
    }
    stop.store(true, Ordering::SeqCst);
    monitor.await.unwrap();

    println!("成功获取: {}/15, 峰值并发: {}", served, peak.load(Ordering::SeqCst));
    assert!(served >= 10);
    assert!(peak.load(Ordering::SeqCst) <= 10);
    assert!(!violated.load(Ordering::SeqCst));
    assert_eq!(pool.active_count(), 0);

    pool.close().await;
}

#[tokio::test]
async fn test_close_destroys_active_and_idle() {
    let driver = MockDriver::new();
    let pool = QuickPool::with_config(test_config(2, 10), driver.factory())
        .await
        .unwrap();
    assert!(wait_until(Duration::from_secs(3), || pool.idle_count() == 2).await);

    let mut held = Vec::new();
    for _ in 0..3 {
        held.push(pool.acquire().await.unwrap());
    }
    assert_eq!(pool.active_count(), 3);
    assert!(wait_until(Duration::from_secs(4), || pool.idle_count() == 2).await);

    pool.close().await;
    assert!(pool.is_closed());
    assert_eq!(pool.active_count(), 0);
    assert_eq!(pool.idle_count(), 0);
    assert_eq!(driver.open_connection_count(), 0);
    assert!(driver.closed_connection_count() >= 5);

    assert!(matches!(
        pool.acquire().await,
        Err(QuickPoolError::PoolClosed { .. })
    ));

    // 关闭后归还的连接直接丢弃
    for connection in held {
        connection.close().await;
    }
    assert_eq!(pool.idle_count(), 0);

    // 重复关闭无副作用
    pool.close().await;
}

#[tokio::test]
async fn test_invalid_idle_connection_replaced_on_borrow() {
    let driver = MockDriver::new();
    let pool = QuickPool::with_config(test_config(1, 2), driver.factory())
        .await
        .unwrap();
    assert!(wait_until(Duration::from_secs(3), || pool.idle_count() == 1).await);

    driver.invalidate_all();
    let connection = pool.acquire().await.unwrap();
    let serial = connection
        .raw()
        .await
        .as_any()
        .downcast_ref::<MockConnection>()
        .map(|raw| raw.state.serial);
    assert_eq!(serial, Some(2));
    assert_eq!(driver.closed_connection_count(), 1);

    connection.close().await;
    pool.close().await;
}

#[tokio::test]
async fn test_sweep_idle_destroys_invalid() {
    let driver = MockDriver::new();
    let pool = QuickPool::with_config(test_config(2, 4), driver.factory())
        .await
        .unwrap();
    assert!(wait_until(Duration::from_secs(3), || pool.idle_count() == 2).await);

    driver.invalidate_all();
    pool.sweep_idle().await;
    assert_eq!(driver.closed_connection_count(), 2);

    pool.close().await;
}

#[tokio::test]
async fn test_release_destroys_when_idle_full() {
    let driver = MockDriver::new();
    let pool = QuickPool::with_config(test_config(0, 2), driver.factory())
        .await
        .unwrap();

    let connection = pool.acquire().await.unwrap();
    connection.close().await;
    assert_eq!(pool.idle_count(), 0);
    assert_eq!(pool.active_count(), 0);
    assert_eq!(driver.closed_connection_count(), 1);

    pool.close().await;
}

#[tokio::test]
async fn test_release_destroys_connection_failing_return_check() {
    let driver = MockDriver::new();
    let pool = QuickPool::with_config(test_config(1, 1), driver.factory())
        .await
        .unwrap();
    assert!(wait_until(Duration::from_secs(3), || pool.idle_count() == 1).await);

    let connection = pool.acquire().await.unwrap();
    driver.invalidate_all();
    connection.close().await;

    assert_eq!(pool.idle_count(), 0);
    assert_eq!(pool.active_count(), 0);
    assert_eq!(driver.closed_connection_count(), 1);

    pool.close().await;
}

#[tokio::test]
async fn test_worker_stops_cycle_at_retry_limit() {
    let driver = MockDriver::new();
    driver.fail_open.store(true, Ordering::SeqCst);
    let mut config = test_config(2, 4);
    config.retry_limit = 3;
    config.retry_interval_ms = 50;
    let pool = QuickPool::with_config(config, driver.factory()).await.unwrap();

    // 监视器每秒才启动下一轮，600 毫秒内只有第一轮的尝试
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(driver.open_attempt_count(), 3);
    assert!(!pool.is_replenishing());
    assert_eq!(pool.idle_count(), 0);

    pool.close().await;
}

#[tokio::test]
async fn test_supervisor_restarts_worker_after_recovery() {
    let driver = MockDriver::new();
    driver.fail_open.store(true, Ordering::SeqCst);
    let pool = QuickPool::with_config(test_config(2, 4), driver.factory())
        .await
        .unwrap();

    assert!(wait_until(Duration::from_millis(600), || driver.open_attempt_count() == 3).await);
    assert!(!pool.is_replenishing());

    driver.fail_open.store(false, Ordering::SeqCst);
    let begin = Instant::now();
    assert!(wait_until(Duration::from_secs(3), || pool.idle_count() == 2).await);
    println!("恢复后补充完成耗时: {:?}", begin.elapsed());
    assert!(begin.elapsed() < Duration::from_millis(1800));
    assert_eq!(driver.open_count(), 2);

    pool.close().await;
}

#[tokio::test]
async fn test_worker_discards_connections_failing_validation() {
    let driver = MockDriver::new();
    driver.invalid_on_open.store(true, Ordering::SeqCst);
    let mut config = test_config(1, 2);
    config.test_on_borrow = true;
    let pool = QuickPool::with_config(config, driver.factory()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(pool.idle_count(), 0);
    assert_eq!(driver.open_count(), 3);
    assert_eq!(driver.closed_connection_count(), 3);
    assert_eq!(pool.stats().total_count(), 0);

    pool.close().await;
}

#[tokio::test]
async fn test_release_resets_transactional_connection() {
    let driver = MockDriver::new();
    let mut config = test_config(1, 1);
    config.transactional = true;
    config.test_on_return = false;
    let pool = QuickPool::with_config(config, driver.factory()).await.unwrap();

    let connection = pool.acquire().await.unwrap();
    {
        let mut raw = connection.raw().await;
        raw.set_auto_commit(false).await.unwrap();
        raw.set_transaction_isolation(TransactionIsolation::Serializable)
            .await
            .unwrap();
    }
    connection.close().await;

    let state = Arc::clone(&driver.connections.lock()[0]);
    assert!(state.auto_commit.load(Ordering::SeqCst));
    assert_eq!(*state.isolation.lock(), TransactionIsolation::None);
    assert_eq!(pool.idle_count(), 1);

    pool.close().await;
}

#[tokio::test]
async fn test_credentials_forwarded_to_factory() {
    let driver = MockDriver::new();
    let mut config = test_config(0, 3);
    config.username = "scott".to_string();
    config.password = "tiger".to_string();
    config
        .properties
        .insert("charset".to_string(), "utf8".to_string());
    let pool = QuickPool::with_config(config, driver.factory()).await.unwrap();

    let first = pool.acquire().await.unwrap();
    let second = pool.acquire_with_credentials("admin", "").await.unwrap();

    let connections = driver.connections.lock().clone();
    assert_eq!(connections[0].properties.get("user").map(String::as_str), Some("scott"));
    assert_eq!(connections[0].properties.get("password").map(String::as_str), Some("tiger"));
    assert_eq!(connections[0].properties.get("charset").map(String::as_str), Some("utf8"));
    assert_eq!(connections[1].properties.get("user").map(String::as_str), Some("admin"));
    assert!(!connections[1].properties.contains_key("password"));

    first.close().await;
    second.close().await;
    pool.close().await;
}

#[tokio::test]
async fn test_runtime_settings() {
    let driver = MockDriver::new();
    let pool = QuickPool::with_config(test_config(0, 5), driver.factory())
        .await
        .unwrap();

    pool.set_max_connections(1);
    pool.set_cache_limit_size(8);
    pool.set_retry_limit(1);
    pool.set_validate_timeout(2);
    let stats = pool.stats();
    assert_eq!(stats.max_connections, 1);
    assert_eq!(stats.cache_limit_size, 8);

    let held = pool.acquire().await.unwrap();
    pool.set_connect_timeout(1);
    assert!(matches!(
        pool.acquire().await,
        Err(QuickPoolError::AcquireTimeout { .. })
    ));
    assert!((pool.stats().utilization() - 1.0).abs() < f64::EPSILON);

    held.close().await;
    pool.close().await;
}

#[tokio::test]
async fn test_dropped_connection_returns_to_pool() {
    let driver = MockDriver::new();
    let mut config = test_config(1, 1);
    config.test_on_return = false;
    let pool = QuickPool::with_config(config, driver.factory()).await.unwrap();

    let connection = pool.acquire().await.unwrap();
    drop(connection);

    assert!(
        wait_until(Duration::from_secs(2), || {
            pool.active_count() == 0 && pool.idle_count() == 1
        })
        .await
    );

    pool.close().await;
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let driver = MockDriver::new();
    let config = test_config(5, 2);
    assert!(matches!(
        QuickPool::with_config(config, driver.factory()).await,
        Err(QuickPoolError::ConfigError { .. })
    ));
}
