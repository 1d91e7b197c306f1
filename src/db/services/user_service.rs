use bcrypt::{DEFAULT_COST, hash};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, QuerySelect, Set, SqlErr, TransactionTrait,
};
use tracing::info;

use crate::db::entities::{recipe, recipe_tag, tag, user};

// bcrypt's minimum cost keeps the test suite fast
const PASSWORD_HASH_COST: u32 = if cfg!(test) { 4 } else { DEFAULT_COST };

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("User must have an email address.")]
    MissingEmail,
    #[error("Enter a valid email address: '{0}'.")]
    InvalidEmail(String),
    #[error("A user with the email '{0}' already exists.")]
    DuplicateEmail(String),
    #[error("Password hashing failed: {0}")]
    PasswordHashing(#[from] bcrypt::BcryptError),
    #[error("User not found: {0}")]
    NotFound(i32),
}

/// Optional attributes applied when a user is created.
#[derive(Debug, Clone)]
pub struct ExtraUserFields {
    pub name: String,
    pub is_active: bool,
    pub is_staff: bool,
}

impl Default for ExtraUserFields {
    fn default() -> Self {
        Self {
            name: String::new(),
            is_active: true,
            is_staff: false,
        }
    }
}

/// Fields a user may change on their own account.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub password: Option<String>,
}

/// Lowercases the domain part of an email address. The local part is kept
/// as entered since some mail servers treat it case-sensitively.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_string(),
    }
}

/// Accepts addresses with a single `@` between a non-empty local part and
/// a non-empty domain, without whitespace.
pub fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

pub(crate) fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password, PASSWORD_HASH_COST)
}

/// Creates, saves and returns a new user.
///
/// A `None` password leaves the account without a usable password; such a
/// user can never obtain a token.
pub async fn create_user<C: ConnectionTrait>(
    db: &C,
    email: &str,
    password: Option<&str>,
    extra_fields: ExtraUserFields,
) -> Result<user::Model, UserServiceError> {
    if email.trim().is_empty() {
        return Err(UserServiceError::MissingEmail);
    }
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(UserServiceError::InvalidEmail(email));
    }

    if get_user_by_email(db, &email).await?.is_some() {
        return Err(UserServiceError::DuplicateEmail(email));
    }

    let password_hash = password.map(hash_password).transpose()?;

    let new_user = user::ActiveModel {
        email: Set(email.clone()),
        name: Set(extra_fields.name),
        password_hash: Set(password_hash),
        is_active: Set(extra_fields.is_active),
        is_staff: Set(extra_fields.is_staff),
        is_superuser: Set(false),
        last_login: Set(None),
        ..Default::default()
    };

    let user_model = new_user.insert(db).await.map_err(|e| {
        // Lost a race against a concurrent registration with the same email
        if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
            UserServiceError::DuplicateEmail(email.clone())
        } else {
            UserServiceError::DbErr(e)
        }
    })?;

    info!(user_id = user_model.id, "Created user.");
    Ok(user_model)
}

/// Creates a user and grants it staff and superuser privileges.
pub async fn create_superuser<C: ConnectionTrait>(
    db: &C,
    email: &str,
    password: &str,
) -> Result<user::Model, UserServiceError> {
    let user_model = create_user(db, email, Some(password), ExtraUserFields::default()).await?;

    let mut active_user = user_model.into_active_model();
    active_user.is_staff = Set(true);
    active_user.is_superuser = Set(true);
    let user_model = active_user.update(db).await?;

    info!(user_id = user_model.id, "Promoted user to superuser.");
    Ok(user_model)
}

pub async fn get_user_by_id<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
) -> Result<Option<user::Model>, DbErr> {
    user::Entity::find_by_id(user_id).one(db).await
}

/// Looks a user up by email. The address is normalized first, so lookups
/// match however the domain was capitalized.
pub async fn get_user_by_email<C: ConnectionTrait>(
    db: &C,
    email: &str,
) -> Result<Option<user::Model>, DbErr> {
    user::Entity::find()
        .filter(user::Column::Email.eq(normalize_email(email)))
        .one(db)
        .await
}

/// Applies a partial update to a user. A new password is re-hashed.
pub async fn update_user<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    changes: UserChanges,
) -> Result<user::Model, UserServiceError> {
    let user_model = get_user_by_id(db, user_id)
        .await?
        .ok_or(UserServiceError::NotFound(user_id))?;

    let mut active_user = user_model.clone().into_active_model();
    if let Some(name) = changes.name {
        active_user.name = Set(name);
    }
    if let Some(password) = changes.password {
        active_user.password_hash = Set(Some(hash_password(&password)?));
    }

    if !active_user.is_changed() {
        return Ok(user_model);
    }
    Ok(active_user.update(db).await?)
}

/// Stamps the user's last successful login.
pub async fn record_login<C: ConnectionTrait>(
    db: &C,
    user_model: user::Model,
) -> Result<user::Model, DbErr> {
    let mut active_user = user_model.into_active_model();
    active_user.last_login = Set(Some(Utc::now()));
    active_user.update(db).await
}

/// Deletes a user together with every recipe and tag they own.
pub async fn delete_user(db: &DatabaseConnection, user_id: i32) -> Result<(), UserServiceError> {
    let txn = db.begin().await?;

    if get_user_by_id(&txn, user_id).await?.is_none() {
        return Err(UserServiceError::NotFound(user_id));
    }

    let recipe_ids: Vec<i32> = recipe::Entity::find()
        .select_only()
        .column(recipe::Column::Id)
        .filter(recipe::Column::UserId.eq(user_id))
        .into_tuple()
        .all(&txn)
        .await?;
    let tag_ids: Vec<i32> = tag::Entity::find()
        .select_only()
        .column(tag::Column::Id)
        .filter(tag::Column::UserId.eq(user_id))
        .into_tuple()
        .all(&txn)
        .await?;

    recipe_tag::Entity::delete_many()
        .filter(recipe_tag::Column::RecipeId.is_in(recipe_ids))
        .exec(&txn)
        .await?;
    recipe_tag::Entity::delete_many()
        .filter(recipe_tag::Column::TagId.is_in(tag_ids))
        .exec(&txn)
        .await?;
    let recipes = recipe::Entity::delete_many()
        .filter(recipe::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    let tags = tag::Entity::delete_many()
        .filter(tag::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    user::Entity::delete_by_id(user_id).exec(&txn).await?;

    txn.commit().await?;

    info!(
        user_id,
        recipes_deleted = recipes.rows_affected,
        tags_deleted = tags.rows_affected,
        "Deleted user."
    );
    Ok(())
}
