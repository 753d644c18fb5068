use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::subscription::SubscriptionRepo,
    domain::entities::subscription::{
        Category, Currency, Frequency, Subscription, SubscriptionStatus,
    },
};

const SELECT_COLS: &str = r#"
    id, user_id, name, category, price, currency, frequency, status,
    valid_till, created_at, updated_at
"#;

fn row_to_subscription(row: &sqlx::postgres::PgRow) -> AppResult<Subscription> {
    let category: String = row.get("category");
    let currency: String = row.get("currency");
    let frequency: String = row.get("frequency");
    let status: String = row.get("status");

    Ok(Subscription {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        category: Category::parse(&category)
            .ok_or_else(|| AppError::Store(format!("unknown category {category:?}")))?,
        price: row.get("price"),
        currency: Currency::parse(&currency)
            .ok_or_else(|| AppError::Store(format!("unknown currency {currency:?}")))?,
        frequency: Frequency::parse(&frequency)
            .ok_or_else(|| AppError::Store(format!("unknown frequency {frequency:?}")))?,
        status: SubscriptionStatus::parse(&status)
            .ok_or_else(|| AppError::Store(format!("unknown status {status:?}")))?,
        valid_till: row.get("valid_till"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn rows_to_subscriptions(rows: Vec<sqlx::postgres::PgRow>) -> AppResult<Vec<Subscription>> {
    rows.iter().map(row_to_subscription).collect()
}

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn insert(&self, subscription: &Subscription) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions
                (id, user_id, name, category, price, currency, frequency,
                 status, valid_till, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(subscription.id)
        .bind(subscription.user_id)
        .bind(&subscription.name)
        .bind(subscription.category.as_str())
        .bind(subscription.price)
        .bind(subscription.currency.as_str())
        .bind(subscription.frequency.as_str())
        .bind(subscription.status.as_str())
        .bind(subscription.valid_till)
        .bind(subscription.created_at)
        .bind(subscription.updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM subscriptions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(row_to_subscription).transpose()
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM subscriptions WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        rows_to_subscriptions(rows)
    }

    async fn count_by_user(&self, user_id: Uuid) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM subscriptions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.get("count"))
    }

    async fn mark_cancelled(
        &self,
        id: Uuid,
        valid_till: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
               SET status = 'cancelled', valid_till = $2, updated_at = $3
             WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(id)
        .bind(valid_till)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn apply_renewal(
        &self,
        id: Uuid,
        valid_till: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
               SET valid_till = $2, updated_at = $3
             WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(id)
        .bind(valid_till)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_expired(&self, id: Uuid, updated_at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
               SET status = 'expired', updated_at = $2
             WHERE id = $1 AND status = 'cancelled'
            "#,
        )
        .bind(id)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_cancelled(&self, id: Uuid) -> AppResult<bool> {
        let result =
            sqlx::query("DELETE FROM subscriptions WHERE id = $1 AND status = 'cancelled'")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(AppError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_active_in_windows(
        &self,
        windows: &[(DateTime<Utc>, DateTime<Utc>)],
    ) -> AppResult<Vec<Subscription>> {
        // Offsets are a handful of calendar days; one indexed range query per
        // window reads better than a dynamically assembled OR chain.
        let mut due = Vec::new();
        for (start, end) in windows {
            let rows = sqlx::query(&format!(
                r#"
                SELECT {SELECT_COLS} FROM subscriptions
                 WHERE status = 'active' AND valid_till >= $1 AND valid_till < $2
                "#
            ))
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;
            due.extend(rows_to_subscriptions(rows)?);
        }
        Ok(due)
    }

    async fn list_active_renewing_between(
        &self,
        from: DateTime<Utc>,
        till: DateTime<Utc>,
    ) -> AppResult<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLS} FROM subscriptions
             WHERE status = 'active' AND valid_till >= $1 AND valid_till <= $2
            "#
        ))
        .bind(from)
        .bind(till)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        rows_to_subscriptions(rows)
    }

    async fn list_cancelled_past(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLS} FROM subscriptions
             WHERE status = 'cancelled' AND valid_till < $1
            "#
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        rows_to_subscriptions(rows)
    }
}
