use serde::{Deserialize, Serialize};

use crate::db::entities::user;
use crate::web::error::AppError;

pub mod recipe_models;
pub mod tag_models;

/// Upper bound shared by every short text column.
pub const MAX_TEXT_LENGTH: usize = 255;

/// Trims a text field and checks it against the column constraints.
pub fn validate_text(field: &str, value: &str, allow_blank: bool) -> Result<String, AppError> {
    let value = value.trim();
    if !allow_blank && value.is_empty() {
        return Err(AppError::InvalidInput(format!("{field} may not be blank.")));
    }
    if value.chars().count() > MAX_TEXT_LENGTH {
        return Err(AppError::InvalidInput(format!(
            "Ensure {field} has no more than {MAX_TEXT_LENGTH} characters."
        )));
    }
    Ok(value.to_string())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            is_staff: model.is_staff,
            is_superuser: model.is_superuser,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: i32,
    pub email: String,
}

// JWT Claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (email)
    pub user_id: i32,
    pub exp: usize,  // Expiration time (timestamp)
}

/// The caller resolved by the auth middleware, passed as a request extension.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: i32,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl From<&user::Model> for AuthenticatedUser {
    fn from(model: &user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email.clone(),
            is_staff: model.is_staff,
            is_superuser: model.is_superuser,
        }
    }
}
