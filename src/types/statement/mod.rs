use serde::{Deserialize, Serialize};

/// 语句类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementKind {
    /// 参数化语句
    Prepared,
    /// 存储过程调用语句
    Callable,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Prepared => "prepared",
            StatementKind::Callable => "callable",
        }
    }
}

/// 结果集游标类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultSetType {
    ForwardOnly,
    ScrollInsensitive,
    ScrollSensitive,
}

/// 结果集并发模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultSetConcurrency {
    ReadOnly,
    Updatable,
}

/// 结果集提交后游标保持方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultSetHoldability {
    HoldCursorsOverCommit,
    CloseCursorsAtCommit,
}

/// 事务隔离级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionIsolation {
    /// 不使用事务
    None,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// 语句创建选项
///
/// 每个变体只携带与之相关的选项，缓存键也只由这些选项参与计算
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementOptions {
    /// 仅SQL文本
    Plain,
    /// 指定结果集类型与并发模式
    Concurrency {
        result_set_type: ResultSetType,
        concurrency: ResultSetConcurrency,
    },
    /// 指定结果集类型、并发模式与保持方式
    Holdability {
        result_set_type: ResultSetType,
        concurrency: ResultSetConcurrency,
        holdability: ResultSetHoldability,
    },
    /// 是否返回自动生成的主键（仅参数化语句）
    GeneratedKeys(bool),
    /// 指定返回的列序号（仅参数化语句）
    ColumnIndexes(Vec<u32>),
    /// 指定返回的列名（仅参数化语句）
    ColumnNames(Vec<String>),
}

impl Default for StatementOptions {
    fn default() -> Self {
        StatementOptions::Plain
    }
}

/// 缓存键类型
///
/// 语句类型与选项组合后的九种形态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    SqlOnly,
    SqlConcurrency,
    SqlHoldability,
    SqlAutoGeneratedKeys,
    SqlColumnIndexes,
    SqlColumnNames,
    CallOnly,
    CallConcurrency,
    CallHoldability,
}

impl KeyType {
    /// 根据语句类型与选项确定缓存键类型
    ///
    /// 存储过程调用不支持主键返回与列选择，此时返回 `None`
    pub fn resolve(kind: StatementKind, options: &StatementOptions) -> Option<Self> {
        match (kind, options) {
            (StatementKind::Prepared, StatementOptions::Plain) => Some(KeyType::SqlOnly),
            (StatementKind::Prepared, StatementOptions::Concurrency { .. }) => {
                Some(KeyType::SqlConcurrency)
            }
            (StatementKind::Prepared, StatementOptions::Holdability { .. }) => {
                Some(KeyType::SqlHoldability)
            }
            (StatementKind::Prepared, StatementOptions::GeneratedKeys(_)) => {
                Some(KeyType::SqlAutoGeneratedKeys)
            }
            (StatementKind::Prepared, StatementOptions::ColumnIndexes(_)) => {
                Some(KeyType::SqlColumnIndexes)
            }
            (StatementKind::Prepared, StatementOptions::ColumnNames(_)) => {
                Some(KeyType::SqlColumnNames)
            }
            (StatementKind::Callable, StatementOptions::Plain) => Some(KeyType::CallOnly),
            (StatementKind::Callable, StatementOptions::Concurrency { .. }) => {
                Some(KeyType::CallConcurrency)
            }
            (StatementKind::Callable, StatementOptions::Holdability { .. }) => {
                Some(KeyType::CallHoldability)
            }
            (StatementKind::Callable, _) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::SqlOnly => "SQL_ONLY",
            KeyType::SqlConcurrency => "SQL_CONCURRENCY",
            KeyType::SqlHoldability => "SQL_HOLDABILITY",
            KeyType::SqlAutoGeneratedKeys => "SQL_AUTO_GENERATED_KEYS",
            KeyType::SqlColumnIndexes => "SQL_COLUMN_INDEXES",
            KeyType::SqlColumnNames => "SQL_COLUMN_NAMES",
            KeyType::CallOnly => "CALL_ONLY",
            KeyType::CallConcurrency => "CALL_CONCURRENCY",
            KeyType::CallHoldability => "CALL_HOLDABILITY",
        }
    }
}
