//! Redis-backed durable task queue.
//!
//! Layout:
//! - `queue:scheduled`        ZSET, member = task id, score = process_at (ms)
//! - `queue:task:{id}`        HASH with kind, payload, and retry bookkeeping
//! - `queue:unique:{kind}:{fingerprint}`  uniqueness marker, NX + EX
//! - `queue:done:{id}`        completion record, expires after retention
//!
//! A task is claimed by ZREM: whichever worker removes the member owns it.
//! Delivery is at-least-once; a worker dying mid-handler loses the claim and
//! the reaper's next tick re-enqueues the work it still finds due.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{aio::ConnectionManager, AsyncCommands};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::task_queue::{EnqueueOptions, TaskKind, TaskQueue},
};

const SCHEDULED_KEY: &str = "queue:scheduled";

fn task_key(id: &str) -> String {
    format!("queue:task:{id}")
}

fn done_key(id: &str) -> String {
    format!("queue:done:{id}")
}

fn unique_key(kind: TaskKind, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!(
        "queue:unique:{}:{}",
        kind.as_str(),
        hex::encode(hasher.finalize())
    )
}

/// A task popped off the schedule, ready to run.
#[derive(Debug, Clone)]
pub struct ClaimedTask {
    pub id: String,
    pub kind: TaskKind,
    pub payload: serde_json::Value,
    /// Attempts already burned on this task.
    pub retried: u32,
    pub max_retries: u32,
    pub timeout: std::time::Duration,
    pub retention: std::time::Duration,
}

#[derive(Clone)]
pub struct RedisTaskQueue {
    manager: ConnectionManager,
}

impl RedisTaskQueue {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    /// Pop up to `batch` due tasks. Claims are ZREM races: losing one just
    /// means another worker got the task.
    pub async fn claim_due(
        &self,
        now: DateTime<Utc>,
        batch: usize,
    ) -> AppResult<Vec<ClaimedTask>> {
        let mut conn = self.manager.clone();
        let ids: Vec<String> = conn
            .zrangebyscore_limit(SCHEDULED_KEY, "-inf", now.timestamp_millis(), 0, batch as isize)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

        let mut claimed = Vec::with_capacity(ids.len());
        for id in ids {
            let removed: i64 = conn
                .zrem(SCHEDULED_KEY, &id)
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;
            if removed == 0 {
                continue;
            }

            let fields: HashMap<String, String> = conn
                .hgetall(task_key(&id))
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;
            match parse_task_fields(&id, &fields) {
                Some(task) => claimed.push(task),
                None => {
                    warn!(task_id = %id, "Dropping malformed task record");
                    let _: Result<(), _> = conn.del(task_key(&id)).await;
                }
            }
        }
        Ok(claimed)
    }

    /// Record success and drop the task record. The uniqueness marker is left
    /// to expire on its own so the window spans completion, matching the
    /// enqueue contract.
    pub async fn complete(&self, task: &ClaimedTask) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let _: () = conn
            .set_ex(done_key(&task.id), "done", task.retention.as_secs())
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let _: () = conn
            .del(task_key(&task.id))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(())
    }

    /// Push the task back with a delay, or give up once retries are burned.
    pub async fn retry_or_discard(
        &self,
        task: &ClaimedTask,
        run_at: DateTime<Utc>,
        error: &str,
    ) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let attempt = task.retried + 1;
        if attempt <= task.max_retries {
            let _: () = conn
                .hset(task_key(&task.id), "retried", attempt)
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;
            let _: () = conn
                .zadd(SCHEDULED_KEY, &task.id, run_at.timestamp_millis())
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;
            debug!(task_id = %task.id, attempt, "Task scheduled for retry");
        } else {
            let _: () = conn
                .set_ex(
                    done_key(&task.id),
                    format!("failed: {error}"),
                    task.retention.as_secs(),
                )
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;
            let _: () = conn
                .del(task_key(&task.id))
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;
            warn!(task_id = %task.id, error, "Task exhausted its retries");
        }
        Ok(())
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn enqueue(
        &self,
        kind: TaskKind,
        payload: serde_json::Value,
        options: EnqueueOptions,
    ) -> AppResult<String> {
        let mut conn = self.manager.clone();
        let payload_str = payload.to_string();
        let id = Uuid::new_v4().to_string();

        if !options.unique_for.is_zero() {
            let marker = unique_key(kind, &payload_str);
            let set: Option<String> = redis::cmd("SET")
                .arg(&marker)
                .arg(&id)
                .arg("NX")
                .arg("EX")
                .arg(options.unique_for.as_secs())
                .query_async(&mut conn)
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;
            if set.is_none() {
                // Identical task enqueued within the window; report the one
                // already pending.
                let existing: Option<String> = conn
                    .get(&marker)
                    .await
                    .map_err(|e| AppError::Internal(e.to_string()))?;
                if let Some(existing) = existing {
                    debug!(
                        kind = kind.as_str(),
                        task_id = %existing,
                        "Duplicate enqueue collapsed by uniqueness window"
                    );
                    return Ok(existing);
                }
                // Marker expired between SET and GET; enqueue normally.
            }
        }

        let fields: Vec<(&str, String)> = vec![
            ("kind", kind.as_str().to_string()),
            ("payload", payload_str),
            ("retried", "0".to_string()),
            ("max_retries", options.max_retries.to_string()),
            ("timeout_secs", options.timeout.as_secs().to_string()),
            ("retention_secs", options.retention.as_secs().to_string()),
            ("enqueued_at", Utc::now().to_rfc3339()),
        ];
        let _: () = conn
            .hset_multiple(task_key(&id), &fields)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

        let process_at = options.process_at.unwrap_or_else(Utc::now);
        let _: () = conn
            .zadd(SCHEDULED_KEY, &id, process_at.timestamp_millis())
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

        debug!(
            kind = kind.as_str(),
            task_id = %id,
            process_at = %process_at,
            "Task enqueued"
        );
        Ok(id)
    }

    async fn close(&self) -> AppResult<()> {
        // The connection manager has no explicit shutdown; dropping the last
        // clone closes the multiplexed connection.
        Ok(())
    }
}

fn parse_task_fields(id: &str, fields: &HashMap<String, String>) -> Option<ClaimedTask> {
    let kind = TaskKind::parse(fields.get("kind")?)?;
    let payload = serde_json::from_str(fields.get("payload")?).ok()?;
    let retried = fields.get("retried")?.parse().ok()?;
    let max_retries = fields.get("max_retries")?.parse().ok()?;
    let timeout_secs: u64 = fields.get("timeout_secs")?.parse().ok()?;
    let retention_secs: u64 = fields.get("retention_secs")?.parse().ok()?;
    Some(ClaimedTask {
        id: id.to_string(),
        kind,
        payload,
        retried,
        max_retries,
        timeout: std::time::Duration::from_secs(timeout_secs),
        retention: std::time::Duration::from_secs(retention_secs),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_key_is_stable_per_payload() {
        let a = serde_json::json!({"subscription_id": "abc", "days_before": 7}).to_string();
        let b = serde_json::json!({"subscription_id": "abc", "days_before": 7}).to_string();
        let c = serde_json::json!({"subscription_id": "abc", "days_before": 5}).to_string();

        assert_eq!(
            unique_key(TaskKind::Reminder, &a),
            unique_key(TaskKind::Reminder, &b)
        );
        assert_ne!(
            unique_key(TaskKind::Reminder, &a),
            unique_key(TaskKind::Reminder, &c)
        );
        // Same payload under a different kind is a different task.
        assert_ne!(
            unique_key(TaskKind::Reminder, &a),
            unique_key(TaskKind::Renewal, &a)
        );
    }

    #[test]
    fn task_fields_round_trip() {
        let fields: HashMap<String, String> = [
            ("kind", "subscription:renewal"),
            ("payload", r#"{"subscription_id":"x"}"#),
            ("retried", "2"),
            ("max_retries", "5"),
            ("timeout_secs", "45"),
            ("retention_secs", "86400"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let task = parse_task_fields("t1", &fields).expect("parses");
        assert_eq!(task.kind, TaskKind::Renewal);
        assert_eq!(task.retried, 2);
        assert_eq!(task.max_retries, 5);
        assert_eq!(task.timeout.as_secs(), 45);
    }

    #[test]
    fn malformed_task_fields_are_rejected() {
        let mut fields: HashMap<String, String> = HashMap::new();
        fields.insert("kind".into(), "subscription:unknown".into());
        assert!(parse_task_fields("t1", &fields).is_none());

        fields.insert("kind".into(), "subscription:reminder".into());
        // Missing everything else.
        assert!(parse_task_fields("t1", &fields).is_none());
    }
}
