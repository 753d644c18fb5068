use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use secrecy::SecretString;
use url::Url;

use super::InfraError;
use crate::application::ports::reminder_flags::REMINDER_MARKER_TTL;

pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: SecretString,
    pub resend_api_key: SecretString,
    pub email_from: String,
    pub account_url: Url,
    pub support_url: Url,
    /// Calendar-day offsets at which reminders go out. Every offset must have
    /// a matching email template.
    pub reminder_offsets: Vec<i64>,
    /// Renewal lead window H: how far before `valid_till` a renewal task is
    /// scheduled to fire.
    pub renewal_lead_hours: i64,
    pub reaper_interval: StdDuration,
    pub worker_concurrency: usize,
    pub rate_limit_window_secs: u64,
    pub rate_limit_per_ip: u64,
    /// How long in-flight work gets on shutdown before the process exits.
    pub shutdown_grace: StdDuration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", "127.0.0.1:3001".parse().unwrap());
        let database_url: String = get_env("DATABASE_URL");
        let redis_url: String = get_env_default("REDIS_URL", "redis://127.0.0.1:6379".to_string());

        let jwt_secret: SecretString = SecretString::new(get_env::<String>("JWT_SECRET").into());

        let resend_api_key: SecretString =
            SecretString::new(get_env::<String>("RESEND_API_KEY").into());
        let email_from: String = get_env("EMAIL_FROM");
        let account_url: Url = get_env("ACCOUNT_URL");
        let support_url: Url = get_env("SUPPORT_URL");

        let reminder_offsets = parse_offsets(&get_env_default(
            "REMINDER_OFFSETS",
            "1,2,5,7".to_string(),
        ));
        let renewal_lead_hours: i64 = get_env_default("RENEWAL_LEAD_HOURS", 8);
        let reaper_interval_secs: u64 = get_env_default("REAPER_INTERVAL_SECS", 12 * 60 * 60);
        let worker_concurrency: usize = get_env_default("WORKER_CONCURRENCY", 2);

        let rate_limit_window_secs: u64 = get_env_default("RATE_LIMIT_WINDOW_SECS", 60);
        let rate_limit_per_ip: u64 = get_env_default("RATE_LIMIT_PER_IP", 60);
        let shutdown_grace_secs: u64 = get_env_default("SHUTDOWN_GRACE_SECS", 10);

        Self {
            bind_addr,
            database_url,
            redis_url,
            jwt_secret,
            resend_api_key,
            email_from,
            account_url,
            support_url,
            reminder_offsets,
            renewal_lead_hours,
            reaper_interval: StdDuration::from_secs(reaper_interval_secs),
            worker_concurrency,
            rate_limit_window_secs,
            rate_limit_per_ip,
            shutdown_grace: StdDuration::from_secs(shutdown_grace_secs),
        }
    }

    /// Cross-field checks the individual parsers cannot express. Run once at
    /// startup; a bad relation here silently breaks delivery guarantees
    /// later, so the process must not come up with one.
    pub fn validate(&self) -> Result<(), InfraError> {
        if self.reminder_offsets.is_empty() {
            return Err(InfraError::ConfigInvalid(
                "REMINDER_OFFSETS must list at least one day offset".into(),
            ));
        }
        if self.reminder_offsets.iter().any(|&k| k <= 0) {
            return Err(InfraError::ConfigInvalid(
                "REMINDER_OFFSETS entries must be positive day counts".into(),
            ));
        }
        // At-most-once reminders rely on marker TTL >= reaper interval.
        if self.reaper_interval > REMINDER_MARKER_TTL {
            return Err(InfraError::ConfigInvalid(format!(
                "REAPER_INTERVAL_SECS ({}s) must not exceed the reminder marker TTL ({}s)",
                self.reaper_interval.as_secs(),
                REMINDER_MARKER_TTL.as_secs()
            )));
        }
        if self.renewal_lead_hours < 1 {
            return Err(InfraError::ConfigInvalid(
                "RENEWAL_LEAD_HOURS must be at least 1".into(),
            ));
        }
        if self.worker_concurrency == 0 {
            return Err(InfraError::ConfigInvalid(
                "WORKER_CONCURRENCY must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn renewal_lead(&self) -> chrono::Duration {
        chrono::Duration::hours(self.renewal_lead_hours)
    }
}

fn parse_offsets(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(|part| {
            part.trim()
                .parse()
                .unwrap_or_else(|_| panic!("REMINDER_OFFSETS entry {part:?} is not a number"))
        })
        .collect()
}

fn get_env<T: FromStr>(name: &str) -> T
where
    T::Err: Display,
{
    let raw = env::var(name).unwrap_or_else(|_| panic!("{name} must be set"));
    raw.parse()
        .unwrap_or_else(|e| panic!("{name} is invalid: {e}"))
}

fn get_env_default<T: FromStr>(name: &str, default: T) -> T
where
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{name} is invalid: {e}")),
        Err(_) => default,
    }
}
