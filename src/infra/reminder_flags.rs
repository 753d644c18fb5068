use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};

use crate::app_error::{AppError, AppResult};
use crate::application::ports::reminder_flags::ReminderFlagStore;

/// Redis-backed dispatched-reminder markers. Values are empty; presence plus
/// TTL carries all the meaning.
#[derive(Clone)]
pub struct RedisReminderFlags {
    manager: ConnectionManager,
}

impl RedisReminderFlags {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl ReminderFlagStore for RedisReminderFlags {
    async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.manager.clone();
        let found: bool = conn
            .exists(key)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(found)
    }

    async fn set_with_ttl(&self, key: &str, ttl: Duration) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let _: () = conn
            .set_ex(key, "", ttl.as_secs())
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(())
    }
}
