use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::app_error::AppResult;

/// TTL on a dispatched-reminder marker. Must stay >= the reaper interval or
/// the at-most-once guarantee for reminders breaks; config validation
/// enforces the relation.
pub const REMINDER_MARKER_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Key asserting "a reminder for this (subscription, offset) went out
/// recently". Written by the worker after a successful send, read by the
/// reaper before each enqueue.
pub fn reminder_flag_key(subscription_id: Uuid, days_before: i64) -> String {
    format!("reminder_sent:{}:{}", subscription_id.simple(), days_before)
}

/// Short-lived marker store (Redis in production). Write-with-TTL, no
/// locking.
#[async_trait]
pub trait ReminderFlagStore: Send + Sync {
    async fn exists(&self, key: &str) -> AppResult<bool>;
    async fn set_with_ttl(&self, key: &str, ttl: Duration) -> AppResult<()>;
    async fn ping(&self) -> AppResult<()>;
    async fn close(&self) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_uses_hex_id_and_offset() {
        let id = Uuid::parse_str("a1a2a3a4-b1b2-c1c2-d1d2-d3d4d5d6d7d8").unwrap();
        assert_eq!(
            reminder_flag_key(id, 7),
            "reminder_sent:a1a2a3a4b1b2c1c2d1d2d3d4d5d6d7d8:7"
        );
    }
}
