//! Subscription state machine and billing-period bookkeeping.
//!
//! The three statuses form a one-way machine: active → cancelled → expired.
//! Every transition is a guarded single-row update in the store, so a racing
//! writer loses cleanly (the guarded update reports no match and the caller
//! maps that to a conflict).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::helpers::period::{advance, local_midnight_utc},
    application::validators,
    domain::entities::{
        bill::{Bill, BillStatus},
        subscription::{Category, Currency, Frequency, Subscription, SubscriptionStatus},
    },
};

// ============================================================================
// Input types
// ============================================================================

/// Draft coming in from the request path. Enum fields are already parsed;
/// field-level rules (name length, positive price) are checked at the
/// service entry.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub name: String,
    pub category: Category,
    pub price: i64,
    pub currency: Option<Currency>,
    pub frequency: Frequency,
}

// ============================================================================
// Repository traits
// ============================================================================

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    async fn insert(&self, subscription: &Subscription) -> AppResult<()>;
    async fn get(&self, id: Uuid) -> AppResult<Option<Subscription>>;
    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<Subscription>>;
    async fn count_by_user(&self, user_id: Uuid) -> AppResult<i64>;

    /// active → cancelled, freezing `valid_till`. Returns false when the row
    /// was not in `active` anymore (or gone).
    async fn mark_cancelled(
        &self,
        id: Uuid,
        valid_till: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Extends `valid_till` of an active subscription. Returns false when the
    /// row was not in `active` anymore.
    async fn apply_renewal(
        &self,
        id: Uuid,
        valid_till: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// cancelled → expired. Returns false when the row was not in
    /// `cancelled`.
    async fn mark_expired(&self, id: Uuid, updated_at: DateTime<Utc>) -> AppResult<bool>;

    /// Hard delete, only while cancelled. Returns false when the guard did
    /// not match.
    async fn delete_cancelled(&self, id: Uuid) -> AppResult<bool>;

    /// Active subscriptions whose `valid_till` falls inside any of the given
    /// half-open UTC windows.
    async fn list_active_in_windows(
        &self,
        windows: &[(DateTime<Utc>, DateTime<Utc>)],
    ) -> AppResult<Vec<Subscription>>;

    /// Active subscriptions with `valid_till` in `[from, till]`.
    async fn list_active_renewing_between(
        &self,
        from: DateTime<Utc>,
        till: DateTime<Utc>,
    ) -> AppResult<Vec<Subscription>>;

    /// Cancelled subscriptions whose validity already lapsed.
    async fn list_cancelled_past(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>>;
}

#[async_trait]
pub trait BillRepo: Send + Sync {
    async fn insert(&self, bill: &Bill) -> AppResult<()>;

    /// Newest paid bill by `start_date`.
    async fn latest_paid(&self, subscription_id: Uuid) -> AppResult<Option<Bill>>;

    /// Newest paid bill starting strictly before `start_before`.
    async fn paid_preceding(
        &self,
        subscription_id: Uuid,
        start_before: DateTime<Utc>,
    ) -> AppResult<Option<Bill>>;

    /// paid → refunded. Returns false when the bill was not in `paid`.
    async fn mark_refunded(&self, id: Uuid, updated_at: DateTime<Utc>) -> AppResult<bool>;

    async fn list_by_subscription(&self, subscription_id: Uuid) -> AppResult<Vec<Bill>>;
}

// ============================================================================
// Use cases
// ============================================================================

#[derive(Clone)]
pub struct SubscriptionUseCases {
    subscriptions: Arc<dyn SubscriptionRepo>,
    bills: Arc<dyn BillRepo>,
}

impl SubscriptionUseCases {
    pub fn new(subscriptions: Arc<dyn SubscriptionRepo>, bills: Arc<dyn BillRepo>) -> Self {
        Self {
            subscriptions,
            bills,
        }
    }

    /// Creates a subscription for the authenticated principal, paying for
    /// the first period up front.
    ///
    /// The bill is written before the subscription: a crash in between
    /// leaves an orphan bill (harmless, swept lazily), never an active
    /// subscription without its backing bill.
    pub async fn create(
        &self,
        draft: NewSubscription,
        principal: Uuid,
    ) -> AppResult<Subscription> {
        validators::validate_subscription_name(&draft.name)?;
        validators::validate_price(draft.price)?;

        let now = Utc::now();
        let valid_till = advance(now, draft.frequency);
        let subscription = Subscription {
            id: Uuid::new_v4(),
            user_id: principal,
            name: draft.name.trim().to_string(),
            category: draft.category,
            price: draft.price,
            currency: draft.currency.unwrap_or(Currency::USD),
            frequency: draft.frequency,
            status: SubscriptionStatus::Active,
            valid_till,
            created_at: now,
            updated_at: now,
        };
        let bill = Bill {
            id: Uuid::new_v4(),
            subscription_id: subscription.id,
            amount: subscription.price,
            currency: subscription.currency,
            start_date: now,
            end_date: valid_till,
            status: BillStatus::Paid,
            created_at: now,
            updated_at: now,
        };

        self.bills.insert(&bill).await?;
        self.subscriptions.insert(&subscription).await?;

        debug!(
            subscription_id = %subscription.id,
            valid_till = %subscription.valid_till,
            "Created subscription"
        );
        Ok(subscription)
    }

    pub async fn get(&self, id: Uuid, principal: Uuid) -> AppResult<Subscription> {
        let subscription = self
            .subscriptions
            .get(id)
            .await?
            .ok_or(AppError::NotFound)?;
        if subscription.user_id != principal {
            return Err(AppError::Forbidden);
        }
        Ok(subscription)
    }

    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        principal: Uuid,
    ) -> AppResult<Vec<Subscription>> {
        if user_id != principal {
            return Err(AppError::Forbidden);
        }
        self.subscriptions.list_by_user(user_id).await
    }

    /// Cancels an active subscription. A pre-paid period that has not begun
    /// yet is refunded and `valid_till` rolls back to the previous period
    /// boundary; a period already in progress is kept until it lapses.
    pub async fn cancel(&self, id: Uuid, principal: Uuid) -> AppResult<Subscription> {
        let mut subscription = self.get(id, principal).await?;
        if subscription.status != SubscriptionStatus::Active {
            return Err(AppError::Conflict(
                "only active subscriptions can be cancelled".into(),
            ));
        }

        let now = Utc::now();
        let latest = self
            .bills
            .latest_paid(subscription.id)
            .await?
            .ok_or_else(|| AppError::Store("active subscription has no paid bill".into()))?;

        let new_valid_till = if latest.start_date > now {
            // The next period was pre-paid by the renewal worker but has not
            // begun; undo it.
            let previous = self
                .bills
                .paid_preceding(subscription.id, latest.start_date)
                .await?
                .ok_or_else(|| AppError::Store("pre-paid bill has no predecessor".into()))?;
            if !self.bills.mark_refunded(latest.id, now).await? {
                return Err(AppError::Conflict("bill state changed concurrently".into()));
            }
            debug!(
                subscription_id = %subscription.id,
                bill_id = %latest.id,
                "Refunded unstarted pre-paid period"
            );
            previous.end_date
        } else {
            subscription.valid_till
        };

        if !self
            .subscriptions
            .mark_cancelled(subscription.id, new_valid_till, now)
            .await?
        {
            return Err(AppError::Conflict(
                "subscription state changed concurrently".into(),
            ));
        }

        subscription.status = SubscriptionStatus::Cancelled;
        subscription.valid_till = new_valid_till;
        subscription.updated_at = now;
        Ok(subscription)
    }

    /// Hard-deletes a cancelled subscription. Bills stay behind for audit.
    pub async fn delete(&self, id: Uuid, principal: Uuid) -> AppResult<()> {
        let subscription = self.get(id, principal).await?;
        match subscription.status {
            SubscriptionStatus::Active => Err(AppError::Conflict(
                "cancel the subscription before deleting it".into(),
            )),
            SubscriptionStatus::Expired => Err(AppError::Conflict(
                "expired subscriptions are retained".into(),
            )),
            SubscriptionStatus::Cancelled => {
                if !self.subscriptions.delete_cancelled(id).await? {
                    return Err(AppError::Conflict(
                        "subscription state changed concurrently".into(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Extends an active subscription by one period. Internal: invoked by the
    /// renewal worker, never by the request path.
    ///
    /// Precondition: the latest paid period has begun. A redelivered renewal
    /// task sees the freshly written future-start bill and lands here in
    /// `conflict`, which the worker treats as done.
    pub async fn renew(&self, id: Uuid) -> AppResult<Subscription> {
        let mut subscription = self
            .subscriptions
            .get(id)
            .await?
            .ok_or(AppError::NotFound)?;
        if subscription.status != SubscriptionStatus::Active {
            return Err(AppError::Conflict(
                "only active subscriptions can be renewed".into(),
            ));
        }

        let now = Utc::now();
        let latest = self
            .bills
            .latest_paid(subscription.id)
            .await?
            .ok_or_else(|| AppError::Store("active subscription has no paid bill".into()))?;
        if latest.start_date > now {
            return Err(AppError::Conflict("renewal already applied".into()));
        }

        let start = latest.end_date;
        let end = advance(start, subscription.frequency);
        let bill = Bill {
            id: Uuid::new_v4(),
            subscription_id: subscription.id,
            amount: subscription.price,
            currency: subscription.currency,
            start_date: start,
            end_date: end,
            status: BillStatus::Paid,
            created_at: now,
            updated_at: now,
        };

        // Same write order as create: bill first. If a concurrent cancel
        // wins the guarded update below, its refund pass owns the bill we
        // just wrote.
        self.bills.insert(&bill).await?;
        if !self.subscriptions.apply_renewal(subscription.id, end, now).await? {
            warn!(
                subscription_id = %subscription.id,
                "Renewal superseded by a concurrent transition"
            );
            return Err(AppError::Conflict(
                "subscription is no longer active".into(),
            ));
        }

        debug!(
            subscription_id = %subscription.id,
            new_valid_till = %end,
            "Renewed subscription"
        );
        subscription.valid_till = end;
        subscription.updated_at = now;
        Ok(subscription)
    }

    /// cancelled → expired. Internal: invoked by the expiration worker once
    /// `valid_till` is in the past. Terminal.
    pub async fn mark_expired(&self, id: Uuid) -> AppResult<()> {
        let subscription = self
            .subscriptions
            .get(id)
            .await?
            .ok_or(AppError::NotFound)?;
        if subscription.status != SubscriptionStatus::Cancelled {
            return Err(AppError::Conflict(
                "only cancelled subscriptions expire".into(),
            ));
        }
        if !self.subscriptions.mark_expired(id, Utc::now()).await? {
            return Err(AppError::Conflict(
                "subscription state changed concurrently".into(),
            ));
        }
        Ok(())
    }

    pub async fn bills_for(&self, subscription_id: Uuid) -> AppResult<Vec<Bill>> {
        self.bills.list_by_subscription(subscription_id).await
    }

    // ========================================================================
    // Reaper queries
    // ========================================================================

    /// Active subscriptions whose `valid_till` lands on the local calendar
    /// day `today + k` for some offset k.
    pub async fn due_for_reminder(
        &self,
        now: DateTime<Utc>,
        offsets: &[i64],
    ) -> AppResult<Vec<Subscription>> {
        let today = now.with_timezone(&Local).date_naive();
        let mut windows = Vec::with_capacity(offsets.len());
        for &k in offsets {
            let day = today + Duration::days(k);
            windows.push((
                local_midnight_utc(day),
                local_midnight_utc(day + Duration::days(1)),
            ));
        }
        self.subscriptions.list_active_in_windows(&windows).await
    }

    /// Active subscriptions entering the renewal lead window.
    pub async fn due_for_renewal(
        &self,
        now: DateTime<Utc>,
        lead: Duration,
    ) -> AppResult<Vec<Subscription>> {
        self.subscriptions
            .list_active_renewing_between(now + Duration::hours(1), now + lead)
            .await
    }

    /// Cancelled subscriptions whose validity lapsed and that still await
    /// the terminal transition.
    pub async fn cancelled_past_validity(
        &self,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Subscription>> {
        self.subscriptions.list_cancelled_past(now).await
    }
}
