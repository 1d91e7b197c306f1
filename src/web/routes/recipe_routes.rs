use axum::{
    Json, Router,
    extract::{Extension, State},
    http::StatusCode,
    routing::{get, post},
};
use std::sync::Arc;
use tracing::debug;

use crate::db::services::{self, RecipeChanges};
use crate::web::models::AuthenticatedUser;
use crate::web::models::recipe_models::{
    CreateRecipeRequest, PatchRecipeRequest, RecipeDetailResponse, RecipeListQuery, RecipeResponse,
};
use crate::web::extract::{AppJson, AppPath, AppQuery};
use crate::web::{AppError, AppState};

// --- Route Handlers ---

async fn list_recipes_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<RecipeListQuery>,
) -> Result<Json<Vec<RecipeResponse>>, AppError> {
    let tag_ids = query.tag_ids()?;
    let recipes = services::list_recipes(&app_state.db_pool, authenticated_user.id, tag_ids.as_deref()).await?;
    debug!(user_id = authenticated_user.id, count = recipes.len(), "Listed recipes.");
    Ok(Json(recipes.into_iter().map(RecipeResponse::from).collect()))
}

async fn create_recipe_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppJson(payload): AppJson<CreateRecipeRequest>,
) -> Result<(StatusCode, Json<RecipeDetailResponse>), AppError> {
    let new_recipe = payload.into_new_recipe()?;
    let created = services::create_recipe(&app_state.db_pool, authenticated_user.id, new_recipe).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

async fn get_recipe_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(recipe_id): AppPath<i32>,
) -> Result<Json<RecipeDetailResponse>, AppError> {
    let recipe = services::get_recipe(&app_state.db_pool, recipe_id, authenticated_user.id).await?;
    Ok(Json(recipe.into()))
}

async fn patch_recipe_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(recipe_id): AppPath<i32>,
    AppJson(payload): AppJson<PatchRecipeRequest>,
) -> Result<Json<RecipeDetailResponse>, AppError> {
    let changes = payload.into_changes()?;
    let updated = services::update_recipe(&app_state.db_pool, recipe_id, authenticated_user.id, changes).await?;
    Ok(Json(updated.into()))
}

async fn put_recipe_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(recipe_id): AppPath<i32>,
    AppJson(payload): AppJson<CreateRecipeRequest>,
) -> Result<Json<RecipeDetailResponse>, AppError> {
    let changes = RecipeChanges::from(payload.into_new_recipe()?);
    let updated = services::update_recipe(&app_state.db_pool, recipe_id, authenticated_user.id, changes).await?;
    Ok(Json(updated.into()))
}

async fn delete_recipe_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(recipe_id): AppPath<i32>,
) -> Result<StatusCode, AppError> {
    services::delete_recipe(&app_state.db_pool, recipe_id, authenticated_user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn attach_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath((recipe_id, tag_id)): AppPath<(i32, i32)>,
) -> Result<Json<RecipeDetailResponse>, AppError> {
    let recipe = services::attach_tag(&app_state.db_pool, recipe_id, tag_id, authenticated_user.id).await?;
    Ok(Json(recipe.into()))
}

async fn detach_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath((recipe_id, tag_id)): AppPath<(i32, i32)>,
) -> Result<Json<RecipeDetailResponse>, AppError> {
    let recipe = services::detach_tag(&app_state.db_pool, recipe_id, tag_id, authenticated_user.id).await?;
    Ok(Json(recipe.into()))
}

// --- Router ---

pub fn create_recipes_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/recipes", get(list_recipes_handler).post(create_recipe_handler))
        .route(
            "/recipes/{recipe_id}",
            get(get_recipe_handler)
                .put(put_recipe_handler)
                .patch(patch_recipe_handler)
                .delete(delete_recipe_handler),
        )
        .route(
            "/recipes/{recipe_id}/tags/{tag_id}",
            post(attach_tag_handler).delete(detach_tag_handler),
        )
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use rust_decimal::Decimal;
    use serde_json::{Value, json};
    use std::str::FromStr;

    use crate::db::services;
    use crate::test_support::{TestApp, create_sample_recipe};

    const RECIPES_URL: &str = "/api/recipe/recipes";

    fn detail_url(recipe_id: i32) -> String {
        format!("{RECIPES_URL}/{recipe_id}")
    }

    fn price_of(body: &Value) -> Decimal {
        Decimal::from_str(body["price"].as_str().unwrap()).unwrap()
    }

    fn tag_names(body: &Value) -> Vec<String> {
        body["tags"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_auth_required() {
        let app = TestApp::new().await;

        let (status, _) = app.request(Method::GET, RECIPES_URL, None, None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_recipe() {
        let app = TestApp::new().await;
        let user = app.create_user("user@example.com").await;
        let token = app.token_for(&user);
        let payload = json!({
            "title": "Sample recipe",
            "time_minutes": 30,
            "price": "5.99",
            "description": "Sample description",
            "link": "https://example.com/recipe.pdf",
        });

        let (status, body) = app.request(Method::POST, RECIPES_URL, Some(&token), Some(payload)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["title"], "Sample recipe");
        assert_eq!(body["description"], "Sample description");
        assert_eq!(body["link"], "https://example.com/recipe.pdf");
        assert_eq!(body["time_minutes"], 30);
        assert_eq!(price_of(&body), Decimal::new(599, 2));
        assert_eq!(body["tags"], json!([]));
        let recipe_id = body["id"].as_i64().unwrap() as i32;
        let stored = services::get_recipe(&app.db, recipe_id, user.id).await.unwrap();
        assert_eq!(stored.recipe.user_id, user.id);
    }

    #[tokio::test]
    async fn test_price_rendered_with_two_places() {
        let app = TestApp::new().await;
        let user = app.create_user("user@example.com").await;
        let token = app.token_for(&user);
        let payload = json!({ "title": "Toast", "time_minutes": 5, "price": 2.5 });

        let (status, body) = app.request(Method::POST, RECIPES_URL, Some(&token), Some(payload)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["price"], "2.50");
    }

    #[tokio::test]
    async fn test_create_recipe_with_tags() {
        let app = TestApp::new().await;
        let user = app.create_user("user@example.com").await;
        let token = app.token_for(&user);
        let existing = services::create_tag(&app.db, user.id, "Indian").await.unwrap();
        let payload = json!({
            "title": "Pongal",
            "time_minutes": 60,
            "price": "4.50",
            "tags": [{ "name": "Indian" }, { "name": "Breakfast" }],
        });

        let (status, body) = app.request(Method::POST, RECIPES_URL, Some(&token), Some(payload)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(tag_names(&body), vec!["Breakfast", "Indian"]);
        assert!(body["tags"].as_array().unwrap().contains(&json!({ "id": existing.id, "name": "Indian" })));
        let tags = services::get_tags_by_user_id(&app.db, user.id, false).await.unwrap();
        assert_eq!(tags.len(), 2);
    }

    #[tokio::test]
    async fn test_create_recipe_validation() {
        let app = TestApp::new().await;
        let user = app.create_user("user@example.com").await;
        let token = app.token_for(&user);

        let (status, _) = app
            .request(
                Method::POST,
                RECIPES_URL,
                Some(&token),
                Some(json!({ "title": "Too precise", "time_minutes": 5, "price": "1.234" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .request(
                Method::POST,
                RECIPES_URL,
                Some(&token),
                Some(json!({ "title": " ", "time_minutes": 5, "price": "1.25" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(services::list_recipes(&app.db, user.id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_recipe_missing_title() {
        let app = TestApp::new().await;
        let user = app.create_user("user@example.com").await;
        let token = app.token_for(&user);

        let (status, body) = app
            .request(
                Method::POST,
                RECIPES_URL,
                Some(&token),
                Some(json!({ "time_minutes": 5, "price": "1.25" })),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("title"));
        assert!(services::list_recipes(&app.db, user.id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_path_and_query_are_bad_requests() {
        let app = TestApp::new().await;
        let user = app.create_user("user@example.com").await;
        let token = app.token_for(&user);

        let (status, body) = app.request(Method::GET, &format!("{RECIPES_URL}/abc"), Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = app
            .request(Method::POST, &format!("{RECIPES_URL}/1/tags/xyz"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = app
            .request(Method::GET, &format!("{RECIPES_URL}?tags=1,two"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_retrieve_recipes_limited_to_user() {
        let app = TestApp::new().await;
        let user = app.create_user("user@example.com").await;
        let other = app.create_user("other@example.com").await;
        let token = app.token_for(&user);
        let first = create_sample_recipe(&app.db, user.id, "First", &[]).await;
        let second = create_sample_recipe(&app.db, user.id, "Second", &["Quick"]).await;
        create_sample_recipe(&app.db, other.id, "Foreign", &[]).await;

        let (status, body) = app.request(Method::GET, RECIPES_URL, Some(&token), None).await;

        assert_eq!(status, StatusCode::OK);
        let list = body.as_array().unwrap();
        let ids: Vec<i64> = list.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![second.recipe.id as i64, first.recipe.id as i64]);
        assert_eq!(tag_names(&list[0]), vec!["Quick"]);
        // List representation omits the description
        assert!(list[0].get("description").is_none());
    }

    #[tokio::test]
    async fn test_filter_recipes_by_tags() {
        let app = TestApp::new().await;
        let user = app.create_user("user@example.com").await;
        let token = app.token_for(&user);
        let vegan = create_sample_recipe(&app.db, user.id, "Thai Vegetable Curry", &["Vegan"]).await;
        let veggie = create_sample_recipe(&app.db, user.id, "Aubergine with Tahini", &["Vegetarian"]).await;
        create_sample_recipe(&app.db, user.id, "Fish and chips", &[]).await;

        let url = format!("{RECIPES_URL}?tags={},{}", vegan.tags[0].id, veggie.tags[0].id);
        let (status, body) = app.request(Method::GET, &url, Some(&token), None).await;

        assert_eq!(status, StatusCode::OK);
        let titles: Vec<&str> = body.as_array().unwrap().iter().map(|r| r["title"].as_str().unwrap()).collect();
        assert_eq!(titles, vec!["Aubergine with Tahini", "Thai Vegetable Curry"]);

        let (status, _) = app
            .request(Method::GET, &format!("{RECIPES_URL}?tags=abc"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_recipe_detail() {
        let app = TestApp::new().await;
        let user = app.create_user("user@example.com").await;
        let token = app.token_for(&user);
        let recipe = create_sample_recipe(&app.db, user.id, "Detail", &["Dinner"]).await;

        let (status, body) = app
            .request(Method::GET, &detail_url(recipe.recipe.id), Some(&token), None)
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Detail");
        assert_eq!(body["description"], recipe.recipe.description);
        assert_eq!(tag_names(&body), vec!["Dinner"]);
    }

    #[tokio::test]
    async fn test_partial_update() {
        let app = TestApp::new().await;
        let user = app.create_user("user@example.com").await;
        let token = app.token_for(&user);
        let recipe = create_sample_recipe(&app.db, user.id, "Sample recipe title", &["Thai"]).await;

        let (status, body) = app
            .request(
                Method::PATCH,
                &detail_url(recipe.recipe.id),
                Some(&token),
                Some(json!({ "title": "New recipe title" })),
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "New recipe title");
        let refreshed = services::get_recipe(&app.db, recipe.recipe.id, user.id).await.unwrap();
        assert_eq!(refreshed.recipe.title, "New recipe title");
        assert_eq!(refreshed.recipe.link, recipe.recipe.link);
        assert_eq!(refreshed.recipe.price, recipe.recipe.price);
        assert_eq!(refreshed.tags, recipe.tags);
    }

    #[tokio::test]
    async fn test_full_update() {
        let app = TestApp::new().await;
        let user = app.create_user("user@example.com").await;
        let token = app.token_for(&user);
        let recipe = create_sample_recipe(&app.db, user.id, "Old", &["Keep"]).await;
        let payload = json!({
            "title": "New",
            "time_minutes": 10,
            "price": "2.25",
            "tags": [{ "name": "Lunch" }],
        });

        let (status, body) = app
            .request(Method::PUT, &detail_url(recipe.recipe.id), Some(&token), Some(payload))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "New");
        assert_eq!(body["description"], "");
        assert_eq!(body["link"], "");
        assert_eq!(body["time_minutes"], 10);
        assert_eq!(price_of(&body), Decimal::new(225, 2));
        assert_eq!(tag_names(&body), vec!["Lunch"]);
    }

    #[tokio::test]
    async fn test_clear_recipe_tags() {
        let app = TestApp::new().await;
        let user = app.create_user("user@example.com").await;
        let token = app.token_for(&user);
        let recipe = create_sample_recipe(&app.db, user.id, "Tagged", &["Breakfast"]).await;

        let (status, body) = app
            .request(Method::PATCH, &detail_url(recipe.recipe.id), Some(&token), Some(json!({ "tags": [] })))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tags"], json!([]));
        assert!(services::get_tag_by_id(&app.db, recipe.tags[0].id, user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_recipe() {
        let app = TestApp::new().await;
        let user = app.create_user("user@example.com").await;
        let token = app.token_for(&user);
        let recipe = create_sample_recipe(&app.db, user.id, "Doomed", &["Shared"]).await;

        let (status, _) = app
            .request(Method::DELETE, &detail_url(recipe.recipe.id), Some(&token), None)
            .await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(services::get_recipe(&app.db, recipe.recipe.id, user.id).await.is_err());
        assert!(services::get_tag_by_id(&app.db, recipe.tags[0].id, user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_other_users_recipe_is_not_found() {
        let app = TestApp::new().await;
        let owner = app.create_user("owner@example.com").await;
        let intruder = app.create_user("intruder@example.com").await;
        let token = app.token_for(&intruder);
        let recipe = create_sample_recipe(&app.db, owner.id, "Private", &[]).await;
        let url = detail_url(recipe.recipe.id);

        let (get_status, _) = app.request(Method::GET, &url, Some(&token), None).await;
        let (patch_status, _) = app
            .request(Method::PATCH, &url, Some(&token), Some(json!({ "title": "Hijacked" })))
            .await;
        let (delete_status, _) = app.request(Method::DELETE, &url, Some(&token), None).await;

        assert_eq!(get_status, StatusCode::NOT_FOUND);
        assert_eq!(patch_status, StatusCode::NOT_FOUND);
        assert_eq!(delete_status, StatusCode::NOT_FOUND);
        let untouched = services::get_recipe(&app.db, recipe.recipe.id, owner.id).await.unwrap();
        assert_eq!(untouched.recipe.title, "Private");
    }

    #[tokio::test]
    async fn test_attach_and_detach_tag() {
        let app = TestApp::new().await;
        let user = app.create_user("user@example.com").await;
        let other = app.create_user("other@example.com").await;
        let token = app.token_for(&user);
        let recipe = create_sample_recipe(&app.db, user.id, "Salad", &[]).await;
        let tag = services::create_tag(&app.db, user.id, "Fresh").await.unwrap();
        let foreign_tag = services::create_tag(&app.db, other.id, "Foreign").await.unwrap();
        let link_url = format!("{}/tags/{}", detail_url(recipe.recipe.id), tag.id);

        let (status, body) = app.request(Method::POST, &link_url, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tags"], json!([{ "id": tag.id, "name": "Fresh" }]));

        let (status, body) = app.request(Method::POST, &link_url, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tags"].as_array().unwrap().len(), 1);

        let foreign_url = format!("{}/tags/{}", detail_url(recipe.recipe.id), foreign_tag.id);
        let (status, _) = app.request(Method::POST, &foreign_url, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app.request(Method::DELETE, &link_url, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tags"], json!([]));
    }
}
