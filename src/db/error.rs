use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("配置错误: {0}")]
    Config(String),
    #[error("连接池错误: {0}")]
    Pool(String),
    #[error("SQLx 错误: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Couldn't find {entity} with 'id'={id}")]
    NotFound { entity: &'static str, id: i64 },
    #[error("唯一约束冲突: {0}")]
    Conflict(String),
    #[error("事务错误: {0}")]
    Tx(String),
}

impl DbError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        DbError::NotFound { entity, id }
    }
}

/// 获取详细错误描述（中英文） / Get detailed error description (CN/EN)
pub fn describe_error(e: &DbError) -> String {
    match e {
        DbError::Config(msg) => format!("配置错误 / Config error: {}", msg),
        DbError::Pool(msg) => format!("连接池错误 / Pool error: {}", msg),
        DbError::Sqlx(err) => format!("SQLx 错误 / SQLx error: {}", err),
        DbError::NotFound { entity, id } => {
            format!("未找到记录 / Record not found: {} {}", entity, id)
        }
        DbError::Conflict(msg) => format!("唯一约束冲突 / Unique violation: {}", msg),
        DbError::Tx(msg) => format!("事务错误 / Transaction error: {}", msg),
    }
}
