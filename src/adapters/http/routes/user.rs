use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, middleware::Principal},
    app_error::AppResult,
    domain::entities::{subscription::Subscription, user::User},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/{id}", get(get_user).delete(delete_user))
        .route("/users/{id}/subscriptions", get(list_subscriptions))
}

/// Public view of a user; the credential hash never leaves the store layer.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

async fn get_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    let user = state.user_use_cases.get(id, principal.0).await?;
    Ok(Json(user.into()))
}

async fn delete_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.user_use_cases.delete(id, principal.0).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_subscriptions(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Subscription>>> {
    let subscriptions = state
        .subscription_use_cases
        .list_for_user(id, principal.0)
        .await?;
    Ok(Json(subscriptions))
}
