//! Contract for the durable task queue.
//!
//! The queue delivers at-least-once; everything consuming it must stay
//! idempotent. Uniqueness windows only collapse identical (kind, payload)
//! pairs enqueued close together, they are not a correctness mechanism.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_error::AppResult;

/// How long a duplicate (kind, payload) enqueue is treated as a no-op.
pub const UNIQUENESS_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// How long completed task metadata stays observable.
pub const RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Reminder,
    Renewal,
    Expiration,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Reminder => "subscription:reminder",
            TaskKind::Renewal => "subscription:renewal",
            TaskKind::Expiration => "subscription:expiration",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "subscription:reminder" => Some(TaskKind::Reminder),
            "subscription:renewal" => Some(TaskKind::Renewal),
            "subscription:expiration" => Some(TaskKind::Expiration),
            _ => None,
        }
    }

    /// Per-kind handler deadline; exceeding it fails the attempt.
    pub fn handler_timeout(&self) -> Duration {
        match self {
            TaskKind::Reminder | TaskKind::Renewal => Duration::from_secs(45),
            TaskKind::Expiration => Duration::from_secs(30),
        }
    }

    pub fn max_retries(&self) -> u32 {
        match self {
            TaskKind::Renewal => 5,
            TaskKind::Reminder | TaskKind::Expiration => 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    pub unique_for: Duration,
    pub retention: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
    /// Hold delivery until this instant; `None` delivers as soon as a worker
    /// is free.
    pub process_at: Option<DateTime<Utc>>,
}

impl EnqueueOptions {
    pub fn for_kind(kind: TaskKind) -> Self {
        Self {
            unique_for: UNIQUENESS_WINDOW,
            retention: RETENTION,
            timeout: kind.handler_timeout(),
            max_retries: kind.max_retries(),
            process_at: None,
        }
    }

    pub fn process_at(mut self, at: DateTime<Utc>) -> Self {
        self.process_at = Some(at);
        self
    }
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue a task. A duplicate (kind, payload) within the uniqueness
    /// window succeeds without creating a second task and returns the
    /// already-pending task's id.
    async fn enqueue(
        &self,
        kind: TaskKind,
        payload: serde_json::Value,
        options: EnqueueOptions,
    ) -> AppResult<String>;

    /// Stop accepting work and release client resources. In-flight handlers
    /// are the worker's concern, not the client's.
    async fn close(&self) -> AppResult<()>;
}

// ============================================================================
// Task payloads (wire format)
// ============================================================================
//
// Payloads carry the subscription id plus context for logging. Handlers
// always re-read the subscription from the store; the payload is never
// authoritative.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderPayload {
    pub subscription_id: Uuid,
    pub days_before: i64,
    pub renewal_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewalPayload {
    pub subscription_id: Uuid,
    pub renewal_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpirationPayload {
    pub subscription_id: Uuid,
    pub valid_till: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_round_trip() {
        for kind in [TaskKind::Reminder, TaskKind::Renewal, TaskKind::Expiration] {
            assert_eq!(TaskKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TaskKind::parse("subscription:unknown"), None);
    }

    #[test]
    fn default_options_match_the_contract() {
        let reminder = EnqueueOptions::for_kind(TaskKind::Reminder);
        assert_eq!(reminder.timeout, Duration::from_secs(45));
        assert_eq!(reminder.max_retries, 3);
        assert!(reminder.process_at.is_none());

        let renewal = EnqueueOptions::for_kind(TaskKind::Renewal);
        assert_eq!(renewal.timeout, Duration::from_secs(45));
        assert_eq!(renewal.max_retries, 5);

        let expiration = EnqueueOptions::for_kind(TaskKind::Expiration);
        assert_eq!(expiration.timeout, Duration::from_secs(30));
        assert_eq!(expiration.max_retries, 3);
    }

    #[test]
    fn reminder_payload_serializes_rfc3339() {
        let payload = ReminderPayload {
            subscription_id: Uuid::nil(),
            days_before: 7,
            renewal_date: chrono::Utc::now(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value["renewal_date"].as_str().unwrap().contains('T'));
        assert_eq!(value["days_before"], 7);
    }
}
