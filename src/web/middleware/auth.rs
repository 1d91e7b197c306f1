use axum::{
    body::Body as AxumBody,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tracing::warn;

use crate::db::services::user_service;
use crate::services::auth_service;
use crate::web::models::AuthenticatedUser;
use crate::web::{AppState, error::AppError};

/// Resolves the caller from a bearer token (or the `token` cookie) and
/// stores it as an `AuthenticatedUser` extension. The token must still refer
/// to an existing, active account.
pub async fn auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    // Try to get token from Authorization header first, then fall back to cookie
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(|s| s.to_string())
        .or_else(|| jar.get("token").map(|c| c.value().to_string()))
        .ok_or(AppError::InvalidCredentials)?;

    let claims = auth_service::decode_token(&token, &state.config.jwt_secret)?;

    let user = user_service::get_user_by_id(&state.db_pool, claims.user_id)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| {
            warn!(user_id = claims.user_id, "Token refers to a missing or inactive user.");
            AppError::InvalidCredentials
        })?;

    req.extensions_mut().insert(AuthenticatedUser::from(&user));
    Ok(next.run(req).await)
}
