//! Mocks for the queue, mailer, and reminder-flag ports.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::{
        mailer::Mailer,
        reminder_flags::ReminderFlagStore,
        task_queue::{EnqueueOptions, TaskKind, TaskQueue},
    },
};

// ============================================================================
// InMemoryTaskQueue
// ============================================================================

#[derive(Debug, Clone)]
pub struct EnqueuedTask {
    pub id: String,
    pub kind: TaskKind,
    pub payload: serde_json::Value,
    pub options: EnqueueOptions,
}

/// Records enqueues and honors the uniqueness window the way the Redis
/// client does: a duplicate (kind, payload) succeeds without a new task.
#[derive(Default)]
pub struct InMemoryTaskQueue {
    tasks: Mutex<Vec<EnqueuedTask>>,
    unique: Mutex<HashMap<String, String>>,
    fail_enqueues: AtomicBool,
    closed: AtomicBool,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueued(&self) -> Vec<EnqueuedTask> {
        self.tasks.lock().unwrap().clone()
    }

    pub fn enqueued_of(&self, kind: TaskKind) -> Vec<EnqueuedTask> {
        self.tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.kind == kind)
            .cloned()
            .collect()
    }

    pub fn fail_enqueues(&self, fail: bool) {
        self.fail_enqueues.store(fail, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn fingerprint(kind: TaskKind, payload: &serde_json::Value) -> String {
        format!("{}:{}", kind.as_str(), payload)
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(
        &self,
        kind: TaskKind,
        payload: serde_json::Value,
        options: EnqueueOptions,
    ) -> AppResult<String> {
        if self.fail_enqueues.load(Ordering::SeqCst) {
            return Err(AppError::Internal("enqueue failed".into()));
        }

        let fingerprint = Self::fingerprint(kind, &payload);
        if !options.unique_for.is_zero() {
            let unique = self.unique.lock().unwrap();
            if let Some(existing) = unique.get(&fingerprint) {
                return Ok(existing.clone());
            }
        }

        let id = Uuid::new_v4().to_string();
        self.unique
            .lock()
            .unwrap()
            .insert(fingerprint, id.clone());
        self.tasks.lock().unwrap().push(EnqueuedTask {
            id: id.clone(),
            kind,
            payload,
            options,
        });
        Ok(id)
    }

    async fn close(&self) -> AppResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Mailers
// ============================================================================

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<()> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok(())
    }
}

/// Always fails; for exercising transport-error paths.
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _to: &str, _subject: &str, _html: &str) -> AppResult<()> {
        Err(AppError::Internal("smtp unreachable".into()))
    }
}

// ============================================================================
// InMemoryReminderFlags
// ============================================================================

/// TTLs are ignored; tests never advance the clock far enough to care.
#[derive(Default)]
pub struct InMemoryReminderFlags {
    keys: Mutex<HashSet<String>>,
    fail_writes: AtomicBool,
}

impl InMemoryReminderFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn seed(&self, key: &str) {
        self.keys.lock().unwrap().insert(key.to_string());
    }
}

#[async_trait]
impl ReminderFlagStore for InMemoryReminderFlags {
    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.keys.lock().unwrap().contains(key))
    }

    async fn set_with_ttl(&self, key: &str, _ttl: Duration) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("kv unavailable".into()));
        }
        self.keys.lock().unwrap().insert(key.to_string());
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
