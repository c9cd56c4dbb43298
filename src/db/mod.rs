pub mod connection;
pub mod error;

pub use connection::{begin_tx, build_pool, build_postgres_url, connect_with_retry};
pub use error::{describe_error, DbError};
