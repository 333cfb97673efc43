//! 语句缓存键生成模块
//!
//! 缓存键由键类型、SQL文本以及该键类型相关的选项组成，
//! 按字段名排序编码为JSON后取SHA-256摘要，保证与选项书写顺序无关。

use rat_logger::debug;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::error::QuickPoolResult;
use crate::types::{KeyType, StatementKind, StatementOptions};

/// 生成语句缓存键
///
/// # 参数
///
/// * `kind` - 语句类型
/// * `sql` - SQL文本
/// * `options` - 语句选项
///
/// # 错误
///
/// 存储过程调用语句携带主键返回或列选择选项时返回 `StatementError`
pub fn generate_identify_key(
    kind: StatementKind,
    sql: &str,
    options: &StatementOptions,
) -> QuickPoolResult<String> {
    let key_type = KeyType::resolve(kind, options).ok_or_else(|| {
        crate::quick_error!(
            statement,
            format!("{} 语句不支持选项 {:?}", kind.as_str(), options)
        )
    })?;

    let mut cache_map: BTreeMap<&'static str, Value> = BTreeMap::new();
    cache_map.insert("KeyType", json!(key_type.as_str()));
    cache_map.insert("SQLCmd", json!(sql));

    match options {
        StatementOptions::Plain => {}
        StatementOptions::Concurrency {
            result_set_type,
            concurrency,
        } => {
            cache_map.insert("ResultSetType", json!(result_set_type));
            cache_map.insert("ResultSetConcurrency", json!(concurrency));
        }
        StatementOptions::Holdability {
            result_set_type,
            concurrency,
            holdability,
        } => {
            cache_map.insert("ResultSetType", json!(result_set_type));
            cache_map.insert("ResultSetConcurrency", json!(concurrency));
            cache_map.insert("ResultSetHoldability", json!(holdability));
        }
        StatementOptions::GeneratedKeys(flag) => {
            cache_map.insert("AutoGeneratedKeys", json!(flag));
        }
        StatementOptions::ColumnIndexes(indexes) => {
            cache_map.insert("ColumnIndexes", json!(indexes));
        }
        StatementOptions::ColumnNames(names) => {
            cache_map.insert("ColumnNames", json!(names));
        }
    }

    let json_data = serde_json::to_string(&cache_map)?;
    crate::debug_log!("语句缓存键原文: {}", json_data);

    let key = hex::encode(Sha256::digest(json_data.as_bytes()));
    debug!("生成语句缓存键: type={}, key={}", key_type.as_str(), key);
    Ok(key)
}
