use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, middleware::Principal},
    app_error::AppResult,
    application::use_cases::subscription::NewSubscription,
    domain::entities::{
        bill::Bill,
        subscription::{Category, Currency, Frequency, Subscription},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subscriptions", post(create))
        .route("/subscriptions/{id}", get(get_by_id).delete(delete))
        .route("/subscriptions/{id}/cancel", post(cancel))
        .route("/subscriptions/{id}/bills", get(list_bills))
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub name: String,
    pub category: Category,
    pub price: i64,
    pub currency: Option<Currency>,
    pub frequency: Frequency,
}

async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<CreateSubscriptionRequest>,
) -> AppResult<(StatusCode, Json<Subscription>)> {
    let draft = NewSubscription {
        name: request.name,
        category: request.category,
        price: request.price,
        currency: request.currency,
        frequency: request.frequency,
    };
    let subscription = state
        .subscription_use_cases
        .create(draft, principal.0)
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

async fn get_by_id(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Subscription>> {
    let subscription = state.subscription_use_cases.get(id, principal.0).await?;
    Ok(Json(subscription))
}

async fn cancel(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Subscription>> {
    let subscription = state.subscription_use_cases.cancel(id, principal.0).await?;
    Ok(Json(subscription))
}

async fn delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.subscription_use_cases.delete(id, principal.0).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_bills(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Bill>>> {
    // Ownership check happens in the get; bills are only reachable through
    // a subscription the caller owns.
    let subscription = state.subscription_use_cases.get(id, principal.0).await?;
    let bills = state.subscription_use_cases.bills_for(subscription.id).await?;
    Ok(Json(bills))
}
