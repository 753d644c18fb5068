use async_trait::async_trait;

use crate::app_error::AppResult;

/// Outbound notification transport. Stateless per message; callers decide
/// whether a send failure is fatal for their flow.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<()>;
}
