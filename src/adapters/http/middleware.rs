use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{adapters::http::app_state::AppState, app_error::AppError, application::jwt};

/// Authenticated principal, inserted by `auth_middleware` and read by the
/// route handlers.
#[derive(Debug, Clone, Copy)]
pub struct Principal(pub Uuid);

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request).ok_or(AppError::Unauthorized)?;
    let claims = jwt::verify(token, &state.config.jwt_secret)?;
    let principal = jwt::principal_id(&claims)?;

    request.extensions_mut().insert(Principal(principal));
    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = forwarded_ip(&request).unwrap_or_else(|| addr.ip().to_string());
    state.rate_limiter.check(&ip).await?;
    Ok(next.run(request).await)
}

fn forwarded_ip(request: &Request) -> Option<String> {
    // Trust X-Forwarded-For / X-Real-IP set by the reverse proxy.
    if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        if let Ok(val) = forwarded.to_str() {
            if let Some(first) = val.split(',').next() {
                let trimmed = first.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    if let Some(real) = request.headers().get("x-real-ip") {
        if let Ok(val) = real.to_str() {
            if !val.trim().is_empty() {
                return Some(val.trim().to_string());
            }
        }
    }
    None
}
