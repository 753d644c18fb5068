use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::subscription::BillRepo,
    domain::entities::{
        bill::{Bill, BillStatus},
        subscription::Currency,
    },
};

const SELECT_COLS: &str = r#"
    id, subscription_id, amount, currency, start_date, end_date, status,
    created_at, updated_at
"#;

fn row_to_bill(row: &sqlx::postgres::PgRow) -> AppResult<Bill> {
    let currency: String = row.get("currency");
    let status: String = row.get("status");

    Ok(Bill {
        id: row.get("id"),
        subscription_id: row.get("subscription_id"),
        amount: row.get("amount"),
        currency: Currency::parse(&currency)
            .ok_or_else(|| AppError::Store(format!("unknown currency {currency:?}")))?,
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        status: BillStatus::parse(&status)
            .ok_or_else(|| AppError::Store(format!("unknown bill status {status:?}")))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl BillRepo for PostgresPersistence {
    async fn insert(&self, bill: &Bill) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bills
                (id, subscription_id, amount, currency, start_date, end_date,
                 status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(bill.id)
        .bind(bill.subscription_id)
        .bind(bill.amount)
        .bind(bill.currency.as_str())
        .bind(bill.start_date)
        .bind(bill.end_date)
        .bind(bill.status.as_str())
        .bind(bill.created_at)
        .bind(bill.updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn latest_paid(&self, subscription_id: Uuid) -> AppResult<Option<Bill>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLS} FROM bills
             WHERE subscription_id = $1 AND status = 'paid'
             ORDER BY start_date DESC
             LIMIT 1
            "#
        ))
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(row_to_bill).transpose()
    }

    async fn paid_preceding(
        &self,
        subscription_id: Uuid,
        start_before: DateTime<Utc>,
    ) -> AppResult<Option<Bill>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLS} FROM bills
             WHERE subscription_id = $1 AND status = 'paid' AND start_date < $2
             ORDER BY start_date DESC
             LIMIT 1
            "#
        ))
        .bind(subscription_id)
        .bind(start_before)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(row_to_bill).transpose()
    }

    async fn mark_refunded(&self, id: Uuid, updated_at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bills
               SET status = 'refunded', updated_at = $2
             WHERE id = $1 AND status = 'paid'
            "#,
        )
        .bind(id)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_by_subscription(&self, subscription_id: Uuid) -> AppResult<Vec<Bill>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLS} FROM bills
             WHERE subscription_id = $1
             ORDER BY start_date ASC
            "#
        ))
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        rows.iter().map(row_to_bill).collect()
    }
}
