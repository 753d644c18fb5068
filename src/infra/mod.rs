use thiserror::Error;

pub mod app;
pub mod config;
pub mod db;
pub mod rate_limit;
pub mod reaper;
pub mod redis_queue;
pub mod reminder_flags;
pub mod setup;
pub mod task_worker;

/// Infrastructure errors that can occur during application startup.
///
/// Display messages are sanitized and safe for logs/console output. Debug
/// output includes the full #[source] chain which may contain connection
/// strings; log with Display (%e), not Debug (?e).
#[derive(Error, Debug)]
pub enum InfraError {
    #[error("Database connection failed. Check DATABASE_URL and ensure the database is running.")]
    DatabaseConnection(#[source] sqlx::Error),

    #[error("Redis connection failed. Check REDIS_URL and credentials.")]
    RedisConnection(#[source] redis::RedisError),

    #[error("Database migration failed")]
    Migration(#[source] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    ConfigInvalid(String),

    #[error("TCP bind failed")]
    TcpBind(#[source] std::io::Error),
}

impl From<sqlx::Error> for InfraError {
    fn from(e: sqlx::Error) -> Self {
        InfraError::DatabaseConnection(e)
    }
}

impl From<redis::RedisError> for InfraError {
    fn from(e: redis::RedisError) -> Self {
        InfraError::RedisConnection(e)
    }
}
