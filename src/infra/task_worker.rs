//! The queue consumer: claims due tasks, dispatches them to the lifecycle
//! handlers under per-kind deadlines, and pushes failures back with backoff.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::{watch, Semaphore};
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::{
    app_error::{AppError, AppResult},
    application::ports::task_queue::TaskKind,
    application::use_cases::lifecycle::LifecycleHandlers,
    infra::redis_queue::{ClaimedTask, RedisTaskQueue},
};

const POLL_INTERVAL_SECS: u64 = 5;
const BATCH_SIZE: usize = 50;

/// Base delay before the first retry.
const BACKOFF_BASE_SECS: u64 = 30;
/// Retries never wait longer than this.
const BACKOFF_CAP_SECS: u64 = 900;
const BACKOFF_JITTER_SECS: u64 = 30;

pub struct TaskWorker {
    queue: RedisTaskQueue,
    handlers: Arc<LifecycleHandlers>,
    concurrency: usize,
}

impl TaskWorker {
    pub fn new(queue: RedisTaskQueue, handlers: Arc<LifecycleHandlers>, concurrency: usize) -> Self {
        Self {
            queue,
            handlers,
            concurrency,
        }
    }

    /// Consume until the shutdown signal fires. Each polled batch is awaited
    /// in full before the next poll, so breaking out of the loop leaves no
    /// handler in flight.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut ticker = interval(Duration::from_secs(POLL_INTERVAL_SECS));

        info!(
            concurrency = self.concurrency,
            poll_interval_secs = POLL_INTERVAL_SECS,
            "Task worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => self.process_batch(&semaphore).await,
            }
        }

        info!("Task worker stopped");
    }

    async fn process_batch(&self, semaphore: &Arc<Semaphore>) {
        let tasks = match self.queue.claim_due(Utc::now(), BATCH_SIZE).await {
            Ok(tasks) => tasks,
            Err(e) => {
                error!(error = %e, "Failed to claim due tasks");
                return;
            }
        };
        if tasks.is_empty() {
            return;
        }

        info!(count = tasks.len(), "Processing tasks");

        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            let queue = self.queue.clone();
            let handlers = Arc::clone(&self.handlers);
            let sem = Arc::clone(semaphore);

            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                run_one(&queue, &handlers, task).await;
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Task handler panicked");
            }
        }
    }
}

async fn run_one(queue: &RedisTaskQueue, handlers: &LifecycleHandlers, task: ClaimedTask) {
    let outcome = tokio::time::timeout(task.timeout, dispatch(handlers, &task)).await;
    let result = match outcome {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout),
    };

    match result {
        Ok(()) => {
            if let Err(e) = queue.complete(&task).await {
                error!(task_id = %task.id, error = %e, "Failed to record task completion");
            }
        }
        Err(e) => {
            warn!(
                task_id = %task.id,
                kind = task.kind.as_str(),
                attempt = task.retried + 1,
                error = %e,
                "Task attempt failed"
            );
            let delay = retry_backoff(task.retried + 1);
            let run_at =
                Utc::now() + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
            if let Err(record_err) = queue.retry_or_discard(&task, run_at, &e.to_string()).await {
                error!(
                    task_id = %task.id,
                    error = %record_err,
                    "Failed to record task failure"
                );
            }
        }
    }
}

async fn dispatch(handlers: &LifecycleHandlers, task: &ClaimedTask) -> AppResult<()> {
    match task.kind {
        TaskKind::Reminder => {
            let payload = decode(&task.payload)?;
            handlers.handle_reminder(payload).await
        }
        TaskKind::Renewal => {
            let payload = decode(&task.payload)?;
            handlers.handle_renewal(payload).await
        }
        TaskKind::Expiration => {
            let payload = decode(&task.payload)?;
            handlers.handle_expiration(payload).await
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(payload: &serde_json::Value) -> AppResult<T> {
    serde_json::from_value(payload.clone())
        .map_err(|e| AppError::Unprocessable(format!("malformed task payload: {e}")))
}

/// Exponential backoff with a little jitter so retry storms spread out.
fn retry_backoff(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE_SECS.saturating_mul(1u64 << (attempt.saturating_sub(1)).min(16));
    let capped = exp.min(BACKOFF_CAP_SECS);
    let jitter = rand::thread_rng().gen_range(0..=BACKOFF_JITTER_SECS);
    Duration::from_secs(capped + jitter)
}
