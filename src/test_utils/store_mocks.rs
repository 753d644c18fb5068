//! In-memory mock implementations of the store repository traits.
//!
//! Guarded transitions behave exactly like the SQL adapters: the update
//! applies only when the current status matches, and the caller learns
//! whether it did.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    application::use_cases::subscription::{BillRepo, SubscriptionRepo},
    application::use_cases::user::UserRepo,
    domain::entities::{
        bill::{Bill, BillStatus},
        subscription::{Subscription, SubscriptionStatus},
        user::User,
    },
};

// ============================================================================
// InMemorySubscriptionRepo
// ============================================================================

#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    rows: Mutex<HashMap<Uuid, Subscription>>,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, subscription: Subscription) {
        self.rows
            .lock()
            .unwrap()
            .insert(subscription.id, subscription);
    }
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptionRepo {
    async fn insert(&self, subscription: &Subscription) -> AppResult<()> {
        self.rows
            .lock()
            .unwrap()
            .insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<Subscription>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn count_by_user(&self, user_id: Uuid) -> AppResult<i64> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id)
            .count() as i64)
    }

    async fn mark_cancelled(
        &self,
        id: Uuid,
        valid_till: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&id) {
            Some(s) if s.status == SubscriptionStatus::Active => {
                s.status = SubscriptionStatus::Cancelled;
                s.valid_till = valid_till;
                s.updated_at = updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn apply_renewal(
        &self,
        id: Uuid,
        valid_till: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&id) {
            Some(s) if s.status == SubscriptionStatus::Active => {
                s.valid_till = valid_till;
                s.updated_at = updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_expired(&self, id: Uuid, updated_at: DateTime<Utc>) -> AppResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&id) {
            Some(s) if s.status == SubscriptionStatus::Cancelled => {
                s.status = SubscriptionStatus::Expired;
                s.updated_at = updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_cancelled(&self, id: Uuid) -> AppResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get(&id) {
            Some(s) if s.status == SubscriptionStatus::Cancelled => {
                rows.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_active_in_windows(
        &self,
        windows: &[(DateTime<Utc>, DateTime<Utc>)],
    ) -> AppResult<Vec<Subscription>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|s| {
                s.status == SubscriptionStatus::Active
                    && windows
                        .iter()
                        .any(|(start, end)| s.valid_till >= *start && s.valid_till < *end)
            })
            .cloned()
            .collect())
    }

    async fn list_active_renewing_between(
        &self,
        from: DateTime<Utc>,
        till: DateTime<Utc>,
    ) -> AppResult<Vec<Subscription>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|s| {
                s.status == SubscriptionStatus::Active
                    && s.valid_till >= from
                    && s.valid_till <= till
            })
            .cloned()
            .collect())
    }

    async fn list_cancelled_past(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.status == SubscriptionStatus::Cancelled && s.valid_till < now)
            .cloned()
            .collect())
    }
}

// ============================================================================
// InMemoryBillRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryBillRepo {
    rows: Mutex<HashMap<Uuid, Bill>>,
}

impl InMemoryBillRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, bill: Bill) {
        self.rows.lock().unwrap().insert(bill.id, bill);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl BillRepo for InMemoryBillRepo {
    async fn insert(&self, bill: &Bill) -> AppResult<()> {
        self.rows.lock().unwrap().insert(bill.id, bill.clone());
        Ok(())
    }

    async fn latest_paid(&self, subscription_id: Uuid) -> AppResult<Option<Bill>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|b| b.subscription_id == subscription_id && b.status == BillStatus::Paid)
            .max_by_key(|b| b.start_date)
            .cloned())
    }

    async fn paid_preceding(
        &self,
        subscription_id: Uuid,
        start_before: DateTime<Utc>,
    ) -> AppResult<Option<Bill>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|b| {
                b.subscription_id == subscription_id
                    && b.status == BillStatus::Paid
                    && b.start_date < start_before
            })
            .max_by_key(|b| b.start_date)
            .cloned())
    }

    async fn mark_refunded(&self, id: Uuid, updated_at: DateTime<Utc>) -> AppResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&id) {
            Some(b) if b.status == BillStatus::Paid => {
                b.status = BillStatus::Refunded;
                b.updated_at = updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_by_subscription(&self, subscription_id: Uuid) -> AppResult<Vec<Bill>> {
        let mut bills: Vec<Bill> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|b| b.subscription_id == subscription_id)
            .cloned()
            .collect();
        bills.sort_by_key(|b| b.start_date);
        Ok(bills)
    }
}

// ============================================================================
// InMemoryUserRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryUserRepo {
    rows: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, user: User) {
        self.rows.lock().unwrap().insert(user.id, user);
    }
}

#[async_trait]
impl UserRepo for InMemoryUserRepo {
    async fn get(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.rows.lock().unwrap().remove(&id).is_some())
    }
}
