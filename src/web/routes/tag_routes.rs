use axum::{
    Json, Router,
    extract::{Extension, State},
    http::StatusCode,
    routing::get,
};
use std::sync::Arc;

use crate::db::services;
use crate::web::models::tag_models::{CreateTagRequest, PatchTagRequest, TagListQuery, TagResponse};
use crate::web::models::{AuthenticatedUser, validate_text};
use crate::web::extract::{AppJson, AppPath, AppQuery};
use crate::web::{AppError, AppState};

fn tag_not_found() -> AppError {
    AppError::NotFound("Tag not found".to_string())
}

// --- Route Handlers ---

async fn list_tags_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<TagListQuery>,
) -> Result<Json<Vec<TagResponse>>, AppError> {
    let assigned_only = query.assigned_only.unwrap_or(0) != 0;
    let tags = services::get_tags_by_user_id(&app_state.db_pool, authenticated_user.id, assigned_only).await?;
    Ok(Json(tags.into_iter().map(TagResponse::from).collect()))
}

async fn create_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppJson(payload): AppJson<CreateTagRequest>,
) -> Result<(StatusCode, Json<TagResponse>), AppError> {
    let name = validate_text("name", &payload.name, false)?;
    let tag_model = services::create_tag(&app_state.db_pool, authenticated_user.id, &name).await?;
    Ok((StatusCode::CREATED, Json(tag_model.into())))
}

async fn get_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(tag_id): AppPath<i32>,
) -> Result<Json<TagResponse>, AppError> {
    let tag_model = services::get_tag_by_id(&app_state.db_pool, tag_id, authenticated_user.id)
        .await?
        .ok_or_else(tag_not_found)?;
    Ok(Json(tag_model.into()))
}

async fn patch_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(tag_id): AppPath<i32>,
    AppJson(payload): AppJson<PatchTagRequest>,
) -> Result<Json<TagResponse>, AppError> {
    let name = payload
        .name
        .map(|name| validate_text("name", &name, false))
        .transpose()?;
    let tag_model = services::update_tag(&app_state.db_pool, tag_id, authenticated_user.id, name)
        .await?
        .ok_or_else(tag_not_found)?;
    Ok(Json(tag_model.into()))
}

async fn put_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(tag_id): AppPath<i32>,
    AppJson(payload): AppJson<CreateTagRequest>,
) -> Result<Json<TagResponse>, AppError> {
    let name = validate_text("name", &payload.name, false)?;
    let tag_model = services::update_tag(&app_state.db_pool, tag_id, authenticated_user.id, Some(name))
        .await?
        .ok_or_else(tag_not_found)?;
    Ok(Json(tag_model.into()))
}

async fn delete_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(tag_id): AppPath<i32>,
) -> Result<StatusCode, AppError> {
    let rows_affected = services::delete_tag(&app_state.db_pool, tag_id, authenticated_user.id).await?;

    if rows_affected > 0 {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(tag_not_found())
    }
}

// --- Router ---

pub fn create_tags_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tags", get(list_tags_handler).post(create_tag_handler))
        .route(
            "/tags/{tag_id}",
            get(get_tag_handler)
                .put(put_tag_handler)
                .patch(patch_tag_handler)
                .delete(delete_tag_handler),
        )
}
