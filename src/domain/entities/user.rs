use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Account owner. Credential issuance and verification happen in the auth
/// subsystem; this side only ever reads the hash as an opaque string.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
