//! 连接池类型定义模块
//!
//! 定义连接池依赖的外部协作接口：连接工厂、物理连接与物理语句，
//! 以及连接/语句生命周期监听器。

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::QuickPoolResult;
use crate::types::{StatementKind, StatementOptions, TransactionIsolation};

/// 物理语句句柄
///
/// 查询与更新等执行接口由具体驱动提供，连接池不做任何改动，
/// 调用者通过 [`RawStatement::as_any`] 取回驱动自身的语句类型。
#[async_trait]
pub trait RawStatement: Send + Sync {
    /// 清空批处理
    async fn clear_batch(&mut self) -> QuickPoolResult<()>;

    /// 清空已绑定的参数
    async fn clear_parameters(&mut self) -> QuickPoolResult<()>;

    /// 清空警告信息
    async fn clear_warnings(&mut self) -> QuickPoolResult<()>;

    /// 关闭物理语句
    async fn close(&mut self) -> QuickPoolResult<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// 物理数据库连接
#[async_trait]
pub trait RawConnection: Send + Sync {
    /// 在超时时间内检查连接是否可用
    async fn is_valid(&mut self, timeout_secs: u64) -> QuickPoolResult<bool>;

    /// 关闭物理连接
    async fn close(&mut self) -> QuickPoolResult<()>;

    /// 设置自动提交
    async fn set_auto_commit(&mut self, auto_commit: bool) -> QuickPoolResult<()>;

    /// 设置事务隔离级别
    async fn set_transaction_isolation(
        &mut self,
        level: TransactionIsolation,
    ) -> QuickPoolResult<()>;

    /// 创建不带SQL的普通语句，不参与缓存
    async fn create_statement(&mut self) -> QuickPoolResult<Box<dyn RawStatement>>;

    /// 准备参数化语句
    async fn prepare_statement(
        &mut self,
        sql: &str,
        options: &StatementOptions,
    ) -> QuickPoolResult<Box<dyn RawStatement>>;

    /// 准备存储过程调用语句
    async fn prepare_call(
        &mut self,
        sql: &str,
        options: &StatementOptions,
    ) -> QuickPoolResult<Box<dyn RawStatement>>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// 连接工厂
///
/// 根据连接地址与连接属性打开物理连接
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn open(
        &self,
        url: &str,
        properties: &HashMap<String, String>,
    ) -> QuickPoolResult<Box<dyn RawConnection>>;
}

/// 连接事件
#[derive(Debug, Clone)]
pub struct ConnectionEvent {
    /// 池化连接ID
    pub connection_id: Uuid,
    /// 出错时的错误描述
    pub error: Option<String>,
}

/// 语句事件
#[derive(Debug, Clone)]
pub struct StatementEvent {
    /// 所属池化连接ID
    pub connection_id: Uuid,
    /// 语句缓存键
    pub identify_key: String,
    /// 语句类型
    pub kind: StatementKind,
    /// 出错时的错误描述
    pub error: Option<String>,
}

/// 连接生命周期监听器
pub trait ConnectionEventListener: Send + Sync {
    /// 物理连接即将关闭
    fn connection_closed(&self, event: &ConnectionEvent);

    /// 关闭物理连接时出错
    fn connection_error_occurred(&self, event: &ConnectionEvent);
}

/// 语句生命周期监听器
pub trait StatementEventListener: Send + Sync {
    /// 缓存语句已关闭
    fn statement_closed(&self, event: &StatementEvent);

    /// 关闭缓存语句时出错
    fn statement_error_occurred(&self, event: &StatementEvent);
}
