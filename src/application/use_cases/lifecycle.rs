//! Task handlers for the lifecycle worker pool.
//!
//! The queue delivers at least once, so every handler re-reads the
//! subscription and quietly succeeds when the observed state makes the work
//! moot. Returning an error is reserved for attempts worth retrying.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::{
    app_error::{AppError, AppResult},
    application::email_templates::{
        format_price, format_renewal_date, reminder_email, renewal_confirmation_email,
        TemplateData,
    },
    application::ports::{
        mailer::Mailer,
        reminder_flags::{reminder_flag_key, ReminderFlagStore, REMINDER_MARKER_TTL},
        task_queue::{ExpirationPayload, ReminderPayload, RenewalPayload},
    },
    application::use_cases::subscription::{SubscriptionRepo, SubscriptionUseCases},
    application::use_cases::user::UserRepo,
    domain::entities::subscription::{Subscription, SubscriptionStatus},
    domain::entities::user::User,
};

#[derive(Clone)]
pub struct LifecycleHandlers {
    subscription_uc: SubscriptionUseCases,
    subscriptions: Arc<dyn SubscriptionRepo>,
    users: Arc<dyn UserRepo>,
    mailer: Arc<dyn Mailer>,
    flags: Arc<dyn ReminderFlagStore>,
    /// Renewal lead window H; tasks arriving more than H before `valid_till`
    /// are clock-skew artifacts and get re-picked by a later reaper tick.
    renewal_lead: Duration,
    account_url: String,
    support_url: String,
}

impl LifecycleHandlers {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        subscription_uc: SubscriptionUseCases,
        subscriptions: Arc<dyn SubscriptionRepo>,
        users: Arc<dyn UserRepo>,
        mailer: Arc<dyn Mailer>,
        flags: Arc<dyn ReminderFlagStore>,
        renewal_lead: Duration,
        account_url: String,
        support_url: String,
    ) -> Self {
        Self {
            subscription_uc,
            subscriptions,
            users,
            mailer,
            flags,
            renewal_lead,
            account_url,
            support_url,
        }
    }

    /// Sends the upcoming-renewal reminder for one (subscription, offset)
    /// pair and records the dispatch marker afterwards.
    pub async fn handle_reminder(&self, payload: ReminderPayload) -> AppResult<()> {
        let Some(subscription) = self.subscriptions.get(payload.subscription_id).await? else {
            info!(
                subscription_id = %payload.subscription_id,
                "Skipping reminder for deleted subscription"
            );
            return Ok(());
        };
        if subscription.status != SubscriptionStatus::Active {
            info!(
                subscription_id = %subscription.id,
                status = subscription.status.as_str(),
                "Skipping reminder for non-active subscription"
            );
            return Ok(());
        }

        // A missing owner is a store inconsistency worth retrying, unlike the
        // soft skips above.
        let user = self
            .users
            .get(subscription.user_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let data = self.template_data(&subscription, &user, payload.days_before);
        let (subject, html) = reminder_email(payload.days_before, &data).ok_or_else(|| {
            AppError::Unprocessable(format!(
                "no reminder template for {} days before",
                payload.days_before
            ))
        })?;

        self.mailer.send(&user.email, &subject, &html).await?;

        info!(
            subscription_id = %subscription.id,
            days_before = payload.days_before,
            "Reminder sent"
        );

        // Only after a successful send. A lost marker means at worst one
        // duplicate reminder once the TTL and reaper interval disagree.
        let key = reminder_flag_key(subscription.id, payload.days_before);
        if let Err(e) = self.flags.set_with_ttl(&key, REMINDER_MARKER_TTL).await {
            warn!(
                subscription_id = %subscription.id,
                days_before = payload.days_before,
                error = %e,
                "Failed to record reminder marker"
            );
        }
        Ok(())
    }

    /// Applies one renewal and sends the confirmation email. The email is
    /// best-effort: the renewal is already persisted, and failing the task
    /// here would re-run it and double-bill.
    pub async fn handle_renewal(&self, payload: RenewalPayload) -> AppResult<()> {
        let Some(subscription) = self.subscriptions.get(payload.subscription_id).await? else {
            info!(
                subscription_id = %payload.subscription_id,
                "Skipping renewal for deleted subscription"
            );
            return Ok(());
        };
        if subscription.status != SubscriptionStatus::Active {
            info!(
                subscription_id = %subscription.id,
                status = subscription.status.as_str(),
                "Skipping renewal for non-active subscription"
            );
            return Ok(());
        }

        let now = Utc::now();
        if subscription.valid_till > now + self.renewal_lead {
            info!(
                subscription_id = %subscription.id,
                valid_till = %subscription.valid_till,
                "Renewal task arrived early; deferring to a later tick"
            );
            return Ok(());
        }

        let renewed = match self.subscription_uc.renew(subscription.id).await {
            Ok(s) => s,
            Err(AppError::Conflict(_)) => {
                info!(
                    subscription_id = %subscription.id,
                    "Renewal already applied"
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match self.users.get(renewed.user_id).await {
            Ok(Some(user)) => {
                let data = self.template_data(&renewed, &user, 0);
                let (subject, html) = renewal_confirmation_email(&data);
                if let Err(e) = self.mailer.send(&user.email, &subject, &html).await {
                    warn!(
                        subscription_id = %renewed.id,
                        error = %e,
                        "Failed to send renewal confirmation"
                    );
                }
            }
            Ok(None) => warn!(
                subscription_id = %renewed.id,
                "Renewed subscription has no owning user"
            ),
            Err(e) => warn!(
                subscription_id = %renewed.id,
                error = %e,
                "Failed to load user for renewal confirmation"
            ),
        }
        Ok(())
    }

    /// Moves a lapsed cancelled subscription to its terminal state.
    pub async fn handle_expiration(&self, payload: ExpirationPayload) -> AppResult<()> {
        let Some(subscription) = self.subscriptions.get(payload.subscription_id).await? else {
            return Ok(());
        };
        if subscription.status != SubscriptionStatus::Cancelled {
            info!(
                subscription_id = %subscription.id,
                status = subscription.status.as_str(),
                "Skipping expiration for non-cancelled subscription"
            );
            return Ok(());
        }
        if subscription.valid_till > Utc::now() {
            // Reaper misfire; a later tick re-picks it once lapsed.
            return Ok(());
        }

        match self.subscription_uc.mark_expired(subscription.id).await {
            Ok(()) => {
                info!(subscription_id = %subscription.id, "Subscription expired");
                Ok(())
            }
            Err(AppError::Conflict(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn template_data(&self, subscription: &Subscription, user: &User, days_left: i64) -> TemplateData {
        TemplateData {
            user_name: user.name.clone(),
            subscription_name: subscription.name.clone(),
            renewal_date: format_renewal_date(subscription.valid_till),
            plan: subscription.name.clone(),
            price: format_price(
                subscription.price,
                subscription.currency,
                subscription.frequency,
            ),
            days_left,
            account_url: self.account_url.clone(),
            support_url: self.support_url.clone(),
        }
    }
}
