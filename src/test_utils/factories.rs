//! Test data factories for creating valid fixtures.
//!
//! Each factory returns a complete, valid object with sensible defaults;
//! use the closure parameter to override specific fields.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::domain::entities::{
    bill::{Bill, BillStatus},
    subscription::{Category, Currency, Frequency, Subscription, SubscriptionStatus},
    user::User,
};

/// Create an active monthly subscription with one month of validity left.
pub fn create_test_subscription(
    user_id: Uuid,
    overrides: impl FnOnce(&mut Subscription),
) -> Subscription {
    let now = Utc::now();
    let mut subscription = Subscription {
        id: Uuid::new_v4(),
        user_id,
        name: "Streamly".to_string(),
        category: Category::Entertainment,
        price: 999,
        currency: Currency::USD,
        frequency: Frequency::Monthly,
        status: SubscriptionStatus::Active,
        valid_till: now + Duration::days(30),
        created_at: now - Duration::days(1),
        updated_at: now - Duration::days(1),
    };
    overrides(&mut subscription);
    subscription
}

/// Create a paid bill covering the last month.
pub fn create_test_bill(subscription_id: Uuid, overrides: impl FnOnce(&mut Bill)) -> Bill {
    let now = Utc::now();
    let mut bill = Bill {
        id: Uuid::new_v4(),
        subscription_id,
        amount: 999,
        currency: Currency::USD,
        start_date: now - Duration::days(30),
        end_date: now,
        status: BillStatus::Paid,
        created_at: now - Duration::days(30),
        updated_at: now - Duration::days(30),
    };
    overrides(&mut bill);
    bill
}

/// Create a user with a unique email.
pub fn create_test_user(overrides: impl FnOnce(&mut User)) -> User {
    let now = Utc::now();
    let id = Uuid::new_v4();
    let mut user = User {
        id,
        email: format!("user-{}@example.com", id.simple()),
        name: "Ada Lovelace".to_string(),
        password_hash: "$argon2id$test-hash".to_string(),
        created_at: now,
        updated_at: now,
    };
    overrides(&mut user);
    user
}
