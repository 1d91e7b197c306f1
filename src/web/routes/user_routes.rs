use axum::{
    Json, Router,
    extract::{Extension, State},
    http::StatusCode,
    routing::get,
};
use std::sync::Arc;

use crate::db::services::{UserChanges, user_service};
use crate::services::auth_service;
use crate::web::models::{AuthenticatedUser, UpdateUserRequest, UserResponse, validate_text};
use crate::web::extract::AppJson;
use crate::web::{AppError, AppState};

pub fn create_user_router() -> Router<Arc<AppState>> {
    Router::new().route("/me", get(get_me).patch(update_me).delete(delete_me))
}

async fn get_me(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<UserResponse>, AppError> {
    let user = user_service::get_user_by_id(&app_state.db_pool, auth_user.id)
        .await?
        .ok_or(AppError::UserNotFound)?;
    Ok(Json(user.into()))
}

async fn update_me(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let name = payload
        .name
        .map(|name| validate_text("name", &name, true))
        .transpose()?;
    if let Some(password) = payload.password.as_deref() {
        auth_service::validate_password(password)?;
    }

    let changes = UserChanges {
        name,
        password: payload.password,
    };
    let user = user_service::update_user(&app_state.db_pool, auth_user.id, changes).await?;
    Ok(Json(user.into()))
}

async fn delete_me(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
) -> Result<StatusCode, AppError> {
    user_service::delete_user(&app_state.db_pool, auth_user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
