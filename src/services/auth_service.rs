use bcrypt::verify;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sea_orm::DatabaseConnection;
use tracing::{info, warn};

use crate::db::entities::user;
use crate::db::services::{ExtraUserFields, user_service};
use crate::server::config::ServerConfig;
use crate::web::error::AppError;
use crate::web::models::{Claims, LoginRequest, LoginResponse, RegisterRequest, UserResponse, validate_text};

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::InvalidInput(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long."
        )));
    }
    Ok(())
}

pub async fn register_user(pool: &DatabaseConnection, req: RegisterRequest) -> Result<UserResponse, AppError> {
    let email = validate_text("email", &req.email, false)?;
    let name = validate_text("name", &req.name, true)?;
    validate_password(&req.password)?;

    let extra_fields = ExtraUserFields {
        name,
        ..Default::default()
    };
    let user_model = user_service::create_user(pool, &email, Some(&req.password), extra_fields).await?;

    Ok(user_model.into())
}

/// Checks the credentials and issues a token. Every failure mode answers
/// with the same `InvalidCredentials` so callers cannot probe for accounts.
pub async fn login_user(pool: &DatabaseConnection, req: LoginRequest, config: &ServerConfig) -> Result<LoginResponse, AppError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::InvalidInput("Email and password must not be empty.".to_string()));
    }

    let user = user_service::get_user_by_email(pool, &req.email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !user.is_active {
        warn!(user_id = user.id, "Login attempt for inactive user.");
        return Err(AppError::InvalidCredentials);
    }

    let password_hash = match user.password_hash.as_ref() {
        Some(hash) => hash,
        None => return Err(AppError::InvalidCredentials), // No usable password for this user
    };

    let valid_password = verify(&req.password, password_hash)
        .map_err(|e| AppError::InternalServerError(format!("Password verification failed: {e}")))?;

    if !valid_password {
        return Err(AppError::InvalidCredentials);
    }

    let user = user_service::record_login(pool, user).await?;
    info!(user_id = user.id, "User logged in.");

    create_jwt_for_user(&user, &config.jwt_secret, config.jwt_expiration_hours)
}

pub fn create_jwt_for_user(user: &user::Model, jwt_secret: &str, expiration_hours: i64) -> Result<LoginResponse, AppError> {
    let now = Utc::now();
    let expiration = Duration::try_hours(expiration_hours)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            AppError::TokenCreationError(format!("Token lifetime of {expiration_hours} hours is out of range"))
        })?
        .timestamp() as usize;

    let claims = Claims {
        sub: user.email.clone(),
        user_id: user.id,
        exp: expiration,
    };

    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(jwt_secret.as_ref()))
        .map_err(|e| AppError::TokenCreationError(format!("Failed to generate token: {e}")))?;

    Ok(LoginResponse {
        token,
        user_id: user.id,
        email: user.email.clone(),
    })
}

pub fn decode_token(token: &str, jwt_secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_ref()),
        &Validation::default(),
    )
    .map(|token_data| token_data.claims)
    .map_err(|e| {
        warn!(error = ?e, "JWT decoding error.");
        AppError::InvalidCredentials
    })
}
