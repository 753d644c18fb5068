use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::subscription::Currency;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    Paid,
    Refunded,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Paid => "paid",
            BillStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "paid" => Some(BillStatus::Paid),
            "refunded" => Some(BillStatus::Refunded),
            _ => None,
        }
    }
}

/// One period ledger entry. For a given subscription the paid bills form a
/// gap-free chain: each `start_date` equals the previous bill's `end_date`,
/// and the newest `end_date` equals the subscription's `valid_till`.
#[derive(Debug, Clone, Serialize)]
pub struct Bill {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub amount: i64,
    pub currency: Currency,
    /// Inclusive start of the billed period.
    pub start_date: DateTime<Utc>,
    /// Exclusive end of the billed period.
    pub end_date: DateTime<Utc>,
    pub status: BillStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
