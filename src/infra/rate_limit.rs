use redis::{aio::ConnectionManager, AsyncCommands};

use super::InfraError;
use crate::app_error::{AppError, AppResult};

/// Fixed-window request counter keyed by client IP.
#[derive(Clone)]
pub struct RateLimiter {
    manager: ConnectionManager,
    window_secs: u64,
    max_per_ip: u64,
}

impl RateLimiter {
    pub async fn new(
        redis_url: &str,
        window_secs: u64,
        max_per_ip: u64,
    ) -> Result<Self, InfraError> {
        let client = redis::Client::open(redis_url).map_err(InfraError::RedisConnection)?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(InfraError::RedisConnection)?;
        Ok(Self {
            manager,
            window_secs,
            max_per_ip,
        })
    }

    pub async fn check(&self, ip: &str) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let key = format!("rate:ip:{ip}");

        let current: u64 = conn
            .incr(&key, 1u32)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

        if current == 1 {
            let _: () = conn
                .expire(&key, self.window_secs as i64)
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;
        }

        if current > self.max_per_ip {
            return Err(AppError::RateLimited);
        }

        Ok(())
    }
}
