//! Periodic scheduler: scans the store for time-due work and enqueues tasks.
//!
//! The reaper never mutates subscriptions; all writes happen in worker
//! handlers. That keeps every pass safe to re-run, and the queue's
//! uniqueness window absorbs the overlap between consecutive ticks.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::{
    app_error::{AppError, AppResult},
    application::helpers::period::days_between_local,
    application::ports::{
        reminder_flags::{reminder_flag_key, ReminderFlagStore},
        task_queue::{
            EnqueueOptions, ExpirationPayload, ReminderPayload, RenewalPayload, TaskKind,
            TaskQueue,
        },
    },
    application::use_cases::subscription::SubscriptionUseCases,
};

pub struct Reaper {
    subscriptions: SubscriptionUseCases,
    queue: Arc<dyn TaskQueue>,
    flags: Arc<dyn ReminderFlagStore>,
    interval: StdDuration,
    reminder_offsets: Vec<i64>,
    renewal_lead: Duration,
}

impl Reaper {
    pub fn new(
        subscriptions: SubscriptionUseCases,
        queue: Arc<dyn TaskQueue>,
        flags: Arc<dyn ReminderFlagStore>,
        interval: StdDuration,
        reminder_offsets: Vec<i64>,
        renewal_lead: Duration,
    ) -> Self {
        Self {
            subscriptions,
            queue,
            flags,
            interval,
            reminder_offsets,
            renewal_lead,
        }
    }

    /// Tick loop. The first tick fires immediately, giving the startup pass;
    /// the loop exits on the shutdown signal.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        info!(
            interval_secs = self.interval.as_secs(),
            offsets = ?self.reminder_offsets,
            "Reaper started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => self.poll().await,
            }
        }

        info!("Reaper stopped");
    }

    /// One full pass: reminders, renewals, expirations, in that order. A
    /// failing pass never blocks the others.
    pub async fn poll(&self) {
        info!("Polling for subscriptions requiring reminders, renewals, and expirations");

        if let Err(e) = self.reminder_pass().await {
            error!(error = %e, "Reminder pass failed");
        }
        if let Err(e) = self.renewal_pass().await {
            error!(error = %e, "Renewal pass failed");
        }
        if let Err(e) = self.expiration_pass().await {
            error!(error = %e, "Expiration pass failed");
        }
    }

    async fn reminder_pass(&self) -> AppResult<()> {
        let now = Utc::now();
        let due = self
            .subscriptions
            .due_for_reminder(now, &self.reminder_offsets)
            .await?;

        for subscription in due {
            let days_before = days_between_local(now, subscription.valid_till);
            let marker = reminder_flag_key(subscription.id, days_before);

            match self.flags.exists(&marker).await {
                Ok(true) => {
                    debug!(
                        subscription_id = %subscription.id,
                        days_before,
                        "Reminder already sent recently"
                    );
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    error!(
                        subscription_id = %subscription.id,
                        days_before,
                        error = %e,
                        "Failed to check reminder marker"
                    );
                    continue;
                }
            }

            let payload = ReminderPayload {
                subscription_id: subscription.id,
                days_before,
                renewal_date: subscription.valid_till,
            };
            match self
                .enqueue(TaskKind::Reminder, &payload, EnqueueOptions::for_kind(TaskKind::Reminder))
                .await
            {
                Ok(task_id) => info!(
                    subscription_id = %subscription.id,
                    days_before,
                    task_id = %task_id,
                    "Reminder task scheduled"
                ),
                Err(e) => error!(
                    subscription_id = %subscription.id,
                    days_before,
                    error = %e,
                    "Failed to schedule reminder task"
                ),
            }
        }
        Ok(())
    }

    async fn renewal_pass(&self) -> AppResult<()> {
        let now = Utc::now();
        let due = self
            .subscriptions
            .due_for_renewal(now, self.renewal_lead)
            .await?;

        info!(count = due.len(), "Found subscriptions due for renewal");

        for subscription in due {
            // Fire at the lead boundary; if that moment already passed,
            // deliver immediately.
            let mut process_at = subscription.valid_till - self.renewal_lead;
            if process_at < now {
                process_at = now;
            }

            let payload = RenewalPayload {
                subscription_id: subscription.id,
                renewal_date: subscription.valid_till,
            };
            let options = EnqueueOptions::for_kind(TaskKind::Renewal).process_at(process_at);
            match self.enqueue(TaskKind::Renewal, &payload, options).await {
                Ok(task_id) => info!(
                    subscription_id = %subscription.id,
                    task_id = %task_id,
                    process_at = %process_at,
                    "Renewal task scheduled"
                ),
                Err(e) => error!(
                    subscription_id = %subscription.id,
                    error = %e,
                    "Failed to schedule renewal task"
                ),
            }
        }
        Ok(())
    }

    async fn expiration_pass(&self) -> AppResult<()> {
        let now = Utc::now();
        let due = self.subscriptions.cancelled_past_validity(now).await?;

        info!(count = due.len(), "Found subscriptions due for expiration");

        for subscription in due {
            let payload = ExpirationPayload {
                subscription_id: subscription.id,
                valid_till: subscription.valid_till,
            };
            match self
                .enqueue(
                    TaskKind::Expiration,
                    &payload,
                    EnqueueOptions::for_kind(TaskKind::Expiration),
                )
                .await
            {
                Ok(task_id) => info!(
                    subscription_id = %subscription.id,
                    task_id = %task_id,
                    "Expiration task scheduled"
                ),
                Err(e) => error!(
                    subscription_id = %subscription.id,
                    error = %e,
                    "Failed to schedule expiration task"
                ),
            }
        }
        Ok(())
    }

    async fn enqueue<T: Serialize>(
        &self,
        kind: TaskKind,
        payload: &T,
        options: EnqueueOptions,
    ) -> AppResult<String> {
        let value = serde_json::to_value(payload)
            .map_err(|e| AppError::Internal(format!("failed to encode payload: {e}")))?;
        self.queue.enqueue(kind, value, options).await
    }
}
