//! Shared fixtures for the unit and HTTP tests.

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use rust_decimal::Decimal;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use crate::db::entities::user;
use crate::db::schema;
use crate::db::services::{ExtraUserFields, NewRecipe, RecipeWithTags, recipe_service, user_service};
use crate::server::config::ServerConfig;
use crate::services::auth_service;
use crate::web::create_axum_router;

pub const TEST_PASSWORD: &str = "testpass234";

pub fn test_config() -> ServerConfig {
    ServerConfig {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test-secret".to_string(),
        listen_addr: "127.0.0.1:0".to_string(),
        log_dir: "logs".to_string(),
        jwt_expiration_hours: 1,
        max_db_connections: 1,
    }
}

/// A fresh in-memory database with every table created. A single pooled
/// connection keeps all queries on the same in-memory database.
pub async fn setup_db() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.expect("in-memory sqlite should connect");
    schema::create_tables(&db).await.expect("tables should be created");
    db
}

pub async fn create_test_user(db: &DatabaseConnection, email: &str) -> user::Model {
    user_service::create_user(db, email, Some(TEST_PASSWORD), ExtraUserFields::default())
        .await
        .expect("test user should be created")
}

pub async fn create_sample_recipe(
    db: &DatabaseConnection,
    user_id: i32,
    title: &str,
    tags: &[&str],
) -> RecipeWithTags {
    let new_recipe = NewRecipe {
        title: title.to_string(),
        description: "Sample description".to_string(),
        time_minutes: 22,
        price: Decimal::new(525, 2),
        link: "https://example.com/recipe.pdf".to_string(),
        tag_names: Some(tags.iter().map(|t| t.to_string()).collect()),
    };
    recipe_service::create_recipe(db, user_id, new_recipe)
        .await
        .expect("sample recipe should be created")
}

pub struct TestApp {
    pub db: DatabaseConnection,
    pub config: Arc<ServerConfig>,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        let db = setup_db().await;
        let config = Arc::new(test_config());
        let router = create_axum_router(db.clone(), config.clone());
        Self { db, config, router }
    }

    pub async fn create_user(&self, email: &str) -> user::Model {
        create_test_user(&self.db, email).await
    }

    pub fn token_for(&self, user: &user::Model) -> String {
        auth_service::create_jwt_for_user(user, &self.config.jwt_secret, self.config.jwt_expiration_hours)
            .expect("token should be issued")
            .token
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.expect("router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    /// Sends a request, optionally with a bearer token and a JSON body, and
    /// returns the status with the decoded body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request should build");
        self.send(request).await
    }

    pub async fn request_with_cookie(&self, method: Method, uri: &str, cookie: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .expect("request should build");
        self.send(request).await
    }
}
