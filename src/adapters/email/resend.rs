//! Resend transport behind the `Mailer` port.
//!
//! Provider errors are classified rather than surfaced raw: a 429 keeps its
//! rate-limit meaning so the queue's backoff spaces the retries out, other
//! 4xx responses mean the message itself will never be accepted, and
//! everything else is transient transport trouble.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use tracing::warn;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::mailer::Mailer,
};

const DEFAULT_ENDPOINT: &str = "https://api.resend.com/emails";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Provider error bodies are logged at most this long.
const ERROR_DETAIL_CAP: usize = 512;

pub struct ResendMailer {
    client: Client,
    endpoint: String,
    api_key: secrecy::SecretString,
    from: String,
}

impl ResendMailer {
    pub fn new(api_key: secrecy::SecretString, from: String) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT, api_key, from)
    }

    /// Point the mailer at a non-default endpoint (staging, a capture
    /// server in integration tests).
    pub fn with_endpoint(
        endpoint: impl Into<String>,
        api_key: secrecy::SecretString,
        from: String,
    ) -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            from,
        }
    }
}

fn message_body(from: &str, to: &str, subject: &str, html: &str) -> serde_json::Value {
    serde_json::json!({
        "from": from,
        "to": [to],
        "subject": subject,
        "html": html,
    })
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&message_body(&self.from, to, subject, html))
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("email transport unreachable: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        // The body names the rejected field; keep a slice of it for the log
        // line, never for the caller.
        let mut detail = response.text().await.unwrap_or_default();
        detail.truncate(ERROR_DETAIL_CAP);
        warn!(%status, detail, "Email provider rejected the message");

        match status {
            StatusCode::TOO_MANY_REQUESTS => Err(AppError::RateLimited),
            s if s.is_client_error() => Err(AppError::Unprocessable(format!(
                "email provider rejected the message ({s})"
            ))),
            s => Err(AppError::Internal(format!("email provider returned {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_body_wraps_the_recipient_in_a_list() {
        let body = message_body(
            "rebill <billing@example.com>",
            "ada@example.com",
            "Your subscription renews soon",
            "<p>hi</p>",
        );

        assert_eq!(body["from"], "rebill <billing@example.com>");
        assert_eq!(body["to"].as_array().unwrap().len(), 1);
        assert_eq!(body["to"][0], "ada@example.com");
        assert_eq!(body["subject"], "Your subscription renews soon");
        assert_eq!(body["html"], "<p>hi</p>");
    }

    #[test]
    fn endpoint_is_overridable_for_capture_servers() {
        let mailer = ResendMailer::with_endpoint(
            "http://127.0.0.1:9999/emails",
            secrecy::SecretString::new("re_test".to_string().into()),
            "billing@example.com".to_string(),
        );
        assert_eq!(mailer.endpoint, "http://127.0.0.1:9999/emails");
    }
}
