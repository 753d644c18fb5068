use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::subscription::SubscriptionRepo,
    domain::entities::user::User,
};

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct UserUseCases {
    users: Arc<dyn UserRepo>,
    subscriptions: Arc<dyn SubscriptionRepo>,
}

impl UserUseCases {
    pub fn new(users: Arc<dyn UserRepo>, subscriptions: Arc<dyn SubscriptionRepo>) -> Self {
        Self {
            users,
            subscriptions,
        }
    }

    pub async fn get(&self, id: Uuid, principal: Uuid) -> AppResult<User> {
        if id != principal {
            return Err(AppError::Forbidden);
        }
        self.users.get(id).await?.ok_or(AppError::NotFound)
    }

    /// Deletes the account. Refused while any subscription rows survive in
    /// any state; historical bills alone do not block deletion.
    pub async fn delete(&self, id: Uuid, principal: Uuid) -> AppResult<()> {
        if id != principal {
            return Err(AppError::Forbidden);
        }
        let remaining = self.subscriptions.count_by_user(id).await?;
        if remaining > 0 {
            return Err(AppError::Conflict(format!(
                "user still owns {remaining} subscription(s)"
            )));
        }
        if !self.users.delete(id).await? {
            return Err(AppError::NotFound);
        }
        debug!(user_id = %id, "Deleted user");
        Ok(())
    }
}
