//! 借出连接句柄模块

use rat_logger::{debug, warn};
use std::ops::Deref;
use std::sync::Arc;

use super::PooledConnection;
use super::pool::PoolInner;

/// 从连接池借出的连接
///
/// 调用 [`close`](Self::close) 归还连接。未显式归还而被丢弃时，
/// 若处于tokio运行时中则异步归还，否则直接从活跃集合中移除。
pub struct PoolConnection {
    connection: Arc<PooledConnection>,
    pool: Arc<PoolInner>,
    released: bool,
}

impl PoolConnection {
    pub(crate) fn new(connection: Arc<PooledConnection>, pool: Arc<PoolInner>) -> Self {
        Self {
            connection,
            pool,
            released: false,
        }
    }

    /// 底层池化连接
    pub fn pooled(&self) -> &Arc<PooledConnection> {
        &self.connection
    }

    /// 归还连接
    ///
    /// 先检查语句缓存是否超出容量，再交回连接池
    pub async fn close(mut self) {
        self.released = true;
        let connection = Arc::clone(&self.connection);
        let pool = Arc::clone(&self.pool);
        drop(self);

        connection.trim_statement_cache().await;
        pool.release(connection).await;
    }
}

impl Deref for PoolConnection {
    type Target = PooledConnection;

    fn deref(&self) -> &PooledConnection {
        &self.connection
    }
}

impl std::fmt::Debug for PoolConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConnection")
            .field("connection", &self.connection)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for PoolConnection {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let connection = Arc::clone(&self.connection);
        let pool = Arc::clone(&self.pool);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("连接未显式归还，异步归还: id={}", connection.id());
                handle.spawn(async move {
                    connection.trim_statement_cache().await;
                    pool.release(connection).await;
                });
            }
            Err(_) => {
                warn!("连接在运行时之外被丢弃，已从活跃集合移除: id={}", connection.id());
                pool.forget(&connection);
            }
        }
    }
}
