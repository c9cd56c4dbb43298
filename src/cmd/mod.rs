pub mod version;

pub use version::*;

/// 内置的 PostgreSQL 建表脚本
pub const SCHEMA_SQL: &str = include_str!("../../migrations/0001_init.sql");
