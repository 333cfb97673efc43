//! 语句缓存模块
//!
//! 为每个池化连接提供有界的参数化语句/存储过程语句缓存

pub mod cached_statement;
pub mod key_generator;
pub mod statement_cache;
pub mod stats;

pub use cached_statement::CachedStatement;
pub use key_generator::generate_identify_key;
pub use statement_cache::StatementCache;
pub use stats::CacheStats;
