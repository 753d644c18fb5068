use std::sync::Arc;

use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    adapters::{email::resend::ResendMailer, http::app_state::AppState, persistence::PostgresPersistence},
    application::ports::{
        reminder_flags::ReminderFlagStore,
        task_queue::TaskQueue,
    },
    application::use_cases::{
        lifecycle::LifecycleHandlers,
        subscription::{BillRepo, SubscriptionRepo, SubscriptionUseCases},
        user::{UserRepo, UserUseCases},
    },
    infra::{
        config::AppConfig, db::init_db, rate_limit::RateLimiter, reaper::Reaper,
        redis_queue::RedisTaskQueue, reminder_flags::RedisReminderFlags, task_worker::TaskWorker,
        InfraError,
    },
};

/// Everything main() needs: the HTTP state plus the two background actors
/// and the clients to close on the way out.
pub struct Runtime {
    pub state: AppState,
    pub reaper: Reaper,
    pub worker: TaskWorker,
    pub queue: Arc<dyn TaskQueue>,
    pub flags: Arc<dyn ReminderFlagStore>,
    pub pool: PgPool,
}

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,rebill=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

pub async fn init_runtime() -> Result<Runtime, InfraError> {
    init_tracing();

    let config = AppConfig::from_env();
    config.validate()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        reaper_interval_secs = config.reaper_interval.as_secs(),
        renewal_lead_hours = config.renewal_lead_hours,
        reminder_offsets = ?config.reminder_offsets,
        worker_concurrency = config.worker_concurrency,
        "Configuration loaded"
    );

    let pool = init_db(&config.database_url).await?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(InfraError::Migration)?;

    let redis_client =
        redis::Client::open(config.redis_url.as_str()).map_err(InfraError::RedisConnection)?;
    let redis_manager = redis::aio::ConnectionManager::new(redis_client)
        .await
        .map_err(InfraError::RedisConnection)?;

    let rate_limiter = Arc::new(
        RateLimiter::new(
            &config.redis_url,
            config.rate_limit_window_secs,
            config.rate_limit_per_ip,
        )
        .await?,
    );

    let persistence = Arc::new(PostgresPersistence::new(pool.clone()));
    let subscription_repo = persistence.clone() as Arc<dyn SubscriptionRepo>;
    let bill_repo = persistence.clone() as Arc<dyn BillRepo>;
    let user_repo = persistence.clone() as Arc<dyn UserRepo>;

    let subscription_use_cases =
        SubscriptionUseCases::new(subscription_repo.clone(), bill_repo.clone());
    let user_use_cases = UserUseCases::new(user_repo.clone(), subscription_repo.clone());

    let flags: Arc<dyn ReminderFlagStore> =
        Arc::new(RedisReminderFlags::new(redis_manager.clone()));
    let redis_queue = RedisTaskQueue::new(redis_manager);
    let queue: Arc<dyn TaskQueue> = Arc::new(redis_queue.clone());

    let mailer = Arc::new(ResendMailer::new(
        config.resend_api_key.clone(),
        config.email_from.clone(),
    ));

    let handlers = Arc::new(LifecycleHandlers::new(
        subscription_use_cases.clone(),
        subscription_repo,
        user_repo,
        mailer,
        flags.clone(),
        config.renewal_lead(),
        config.account_url.to_string(),
        config.support_url.to_string(),
    ));

    let reaper = Reaper::new(
        subscription_use_cases.clone(),
        queue.clone(),
        flags.clone(),
        config.reaper_interval,
        config.reminder_offsets.clone(),
        config.renewal_lead(),
    );
    let worker = TaskWorker::new(redis_queue, handlers, config.worker_concurrency);

    let state = AppState {
        config: Arc::new(config),
        subscription_use_cases,
        user_use_cases,
        rate_limiter,
        reminder_flags: flags.clone(),
    };

    Ok(Runtime {
        state,
        reaper,
        worker,
        queue,
        flags,
        pool,
    })
}
