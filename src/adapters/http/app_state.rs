use std::sync::Arc;

use crate::{
    application::ports::reminder_flags::ReminderFlagStore,
    application::use_cases::subscription::SubscriptionUseCases,
    application::use_cases::user::UserUseCases,
    infra::config::AppConfig,
    infra::rate_limit::RateLimiter,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub subscription_use_cases: SubscriptionUseCases,
    pub user_use_cases: UserUseCases,
    pub rate_limiter: Arc<RateLimiter>,
    pub reminder_flags: Arc<dyn ReminderFlagStore>,
}
