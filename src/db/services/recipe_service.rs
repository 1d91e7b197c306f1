use std::collections::HashMap;

use rust_decimal::Decimal;
use sea_orm::sea_query::{OnConflict, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, ModelTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::info;

use crate::db::entities::{recipe, recipe_tag, tag};
use crate::db::services::tag_service;

pub const PRICE_MAX_DIGITS: u32 = 5;
pub const PRICE_DECIMAL_PLACES: u32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum RecipeServiceError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Recipe not found: {0}")]
    NotFound(i32),
    #[error("Tag not found: {0}")]
    TagNotFound(i32),
    #[error("Invalid price: {0}")]
    InvalidPrice(String),
}

/// A recipe together with its tags, sorted by name.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeWithTags {
    pub recipe: recipe::Model,
    pub tags: Vec<tag::Model>,
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub title: String,
    pub description: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    /// Tag names resolved against the owner's tags; missing ones are created.
    pub tag_names: Option<Vec<String>>,
}

/// Partial recipe update. `tag_names`, when present, replaces the whole tag
/// set; an empty list clears it.
#[derive(Debug, Clone, Default)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
    pub tag_names: Option<Vec<String>>,
}

impl From<NewRecipe> for RecipeChanges {
    fn from(new_recipe: NewRecipe) -> Self {
        Self {
            title: Some(new_recipe.title),
            description: Some(new_recipe.description),
            time_minutes: Some(new_recipe.time_minutes),
            price: Some(new_recipe.price),
            link: Some(new_recipe.link),
            tag_names: new_recipe.tag_names,
        }
    }
}

/// Checks a price against the column's precision: at most two decimal places
/// and three integer digits. The returned value always carries two places.
pub fn validate_price(price: Decimal) -> Result<Decimal, RecipeServiceError> {
    let mut normalized = price.normalize();
    if normalized.scale() > PRICE_DECIMAL_PLACES {
        return Err(RecipeServiceError::InvalidPrice(format!(
            "Ensure that there are no more than {PRICE_DECIMAL_PLACES} decimal places."
        )));
    }

    let integer_digits = PRICE_MAX_DIGITS - PRICE_DECIMAL_PLACES;
    if normalized.abs() >= Decimal::from(10_i64.pow(integer_digits)) {
        return Err(RecipeServiceError::InvalidPrice(format!(
            "Ensure that there are no more than {integer_digits} digits before the decimal point."
        )));
    }

    normalized.rescale(PRICE_DECIMAL_PLACES);
    Ok(normalized)
}

// --- Internal helpers ---

async fn find_owned_recipe<C: ConnectionTrait>(
    db: &C,
    recipe_id: i32,
    user_id: i32,
) -> Result<recipe::Model, RecipeServiceError> {
    recipe::Entity::find_by_id(recipe_id)
        .filter(recipe::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or(RecipeServiceError::NotFound(recipe_id))
}

/// Loads the tags of several recipes in one query, keyed by recipe id.
async fn load_tags<C: ConnectionTrait>(
    db: &C,
    recipe_ids: &[i32],
) -> Result<HashMap<i32, Vec<tag::Model>>, DbErr> {
    let rows = recipe_tag::Entity::find()
        .filter(recipe_tag::Column::RecipeId.is_in(recipe_ids.iter().copied()))
        .find_also_related(tag::Entity)
        .all(db)
        .await?;

    let mut by_recipe: HashMap<i32, Vec<tag::Model>> = HashMap::new();
    for (link, tag_model) in rows {
        if let Some(tag_model) = tag_model {
            by_recipe.entry(link.recipe_id).or_default().push(tag_model);
        }
    }
    for tags in by_recipe.values_mut() {
        tags.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    }
    Ok(by_recipe)
}

async fn with_tags<C: ConnectionTrait>(
    db: &C,
    recipe_model: recipe::Model,
) -> Result<RecipeWithTags, DbErr> {
    let tags = load_tags(db, &[recipe_model.id])
        .await?
        .remove(&recipe_model.id)
        .unwrap_or_default();
    Ok(RecipeWithTags {
        recipe: recipe_model,
        tags,
    })
}

/// Resolves tag names to the owner's tag ids, creating missing tags.
/// Repeated names collapse to a single id.
async fn resolve_tag_names<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    names: &[String],
) -> Result<Vec<i32>, DbErr> {
    let mut tag_ids = Vec::with_capacity(names.len());
    for name in names {
        let tag_model = tag_service::get_or_create_tag(db, user_id, name).await?;
        if !tag_ids.contains(&tag_model.id) {
            tag_ids.push(tag_model.id);
        }
    }
    Ok(tag_ids)
}

async fn replace_tags<C: ConnectionTrait>(
    db: &C,
    recipe_id: i32,
    tag_ids: &[i32],
) -> Result<(), DbErr> {
    recipe_tag::Entity::delete_many()
        .filter(recipe_tag::Column::RecipeId.eq(recipe_id))
        .exec(db)
        .await?;

    if tag_ids.is_empty() {
        return Ok(());
    }

    let links = tag_ids.iter().map(|&tag_id| recipe_tag::ActiveModel {
        recipe_id: Set(recipe_id),
        tag_id: Set(tag_id),
    });
    recipe_tag::Entity::insert_many(links)
        .exec_without_returning(db)
        .await?;
    Ok(())
}

// --- Recipe Service Functions ---

/// Lists a user's recipes, newest first. With `tag_ids`, only recipes linked
/// to at least one of those tags are returned.
pub async fn list_recipes<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    tag_ids: Option<&[i32]>,
) -> Result<Vec<RecipeWithTags>, DbErr> {
    let mut query = recipe::Entity::find().filter(recipe::Column::UserId.eq(user_id));

    if let Some(tag_ids) = tag_ids.filter(|ids| !ids.is_empty()) {
        query = query.filter(
            recipe::Column::Id.in_subquery(
                Query::select()
                    .column(recipe_tag::Column::RecipeId)
                    .from(recipe_tag::Entity)
                    .and_where(recipe_tag::Column::TagId.is_in(tag_ids.iter().copied()))
                    .to_owned(),
            ),
        );
    }

    let recipes = query.order_by_desc(recipe::Column::Id).all(db).await?;
    let ids: Vec<i32> = recipes.iter().map(|r| r.id).collect();
    let mut tags = load_tags(db, &ids).await?;

    Ok(recipes
        .into_iter()
        .map(|recipe_model| RecipeWithTags {
            tags: tags.remove(&recipe_model.id).unwrap_or_default(),
            recipe: recipe_model,
        })
        .collect())
}

pub async fn get_recipe<C: ConnectionTrait>(
    db: &C,
    recipe_id: i32,
    user_id: i32,
) -> Result<RecipeWithTags, RecipeServiceError> {
    let recipe_model = find_owned_recipe(db, recipe_id, user_id).await?;
    Ok(with_tags(db, recipe_model).await?)
}

pub async fn create_recipe(
    db: &DatabaseConnection,
    user_id: i32,
    new_recipe: NewRecipe,
) -> Result<RecipeWithTags, RecipeServiceError> {
    let price = validate_price(new_recipe.price)?;

    let txn = db.begin().await?;

    let recipe_model = recipe::ActiveModel {
        user_id: Set(user_id),
        title: Set(new_recipe.title),
        description: Set(new_recipe.description),
        time_minutes: Set(new_recipe.time_minutes),
        price: Set(price),
        link: Set(new_recipe.link),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    if let Some(names) = new_recipe.tag_names.as_deref() {
        let tag_ids = resolve_tag_names(&txn, user_id, names).await?;
        replace_tags(&txn, recipe_model.id, &tag_ids).await?;
    }

    let created = with_tags(&txn, recipe_model).await?;
    txn.commit().await?;

    info!(user_id, recipe_id = created.recipe.id, "Created recipe.");
    Ok(created)
}

pub async fn update_recipe(
    db: &DatabaseConnection,
    recipe_id: i32,
    user_id: i32,
    changes: RecipeChanges,
) -> Result<RecipeWithTags, RecipeServiceError> {
    let price = changes.price.map(validate_price).transpose()?;

    let txn = db.begin().await?;

    let recipe_model = find_owned_recipe(&txn, recipe_id, user_id).await?;
    let mut active_recipe = recipe_model.clone().into_active_model();
    if let Some(title) = changes.title {
        active_recipe.title = Set(title);
    }
    if let Some(description) = changes.description {
        active_recipe.description = Set(description);
    }
    if let Some(time_minutes) = changes.time_minutes {
        active_recipe.time_minutes = Set(time_minutes);
    }
    if let Some(price) = price {
        active_recipe.price = Set(price);
    }
    if let Some(link) = changes.link {
        active_recipe.link = Set(link);
    }

    let recipe_model = if active_recipe.is_changed() {
        active_recipe.update(&txn).await?
    } else {
        recipe_model
    };

    if let Some(names) = changes.tag_names.as_deref() {
        let tag_ids = resolve_tag_names(&txn, user_id, names).await?;
        replace_tags(&txn, recipe_id, &tag_ids).await?;
    }

    let updated = with_tags(&txn, recipe_model).await?;
    txn.commit().await?;

    info!(user_id, recipe_id, "Updated recipe.");
    Ok(updated)
}

/// Deletes a recipe and its tag links. The tags themselves are kept since
/// other recipes may still use them.
pub async fn delete_recipe(
    db: &DatabaseConnection,
    recipe_id: i32,
    user_id: i32,
) -> Result<(), RecipeServiceError> {
    let txn = db.begin().await?;

    let recipe_model = find_owned_recipe(&txn, recipe_id, user_id).await?;
    recipe_tag::Entity::delete_many()
        .filter(recipe_tag::Column::RecipeId.eq(recipe_id))
        .exec(&txn)
        .await?;
    recipe_model.delete(&txn).await?;

    txn.commit().await?;

    info!(user_id, recipe_id, "Deleted recipe.");
    Ok(())
}

/// Links one of the user's tags to one of their recipes. Linking a tag that
/// is already attached changes nothing.
pub async fn attach_tag<C: ConnectionTrait>(
    db: &C,
    recipe_id: i32,
    tag_id: i32,
    user_id: i32,
) -> Result<RecipeWithTags, RecipeServiceError> {
    let recipe_model = find_owned_recipe(db, recipe_id, user_id).await?;
    tag_service::get_tag_by_id(db, tag_id, user_id)
        .await?
        .ok_or(RecipeServiceError::TagNotFound(tag_id))?;

    let link = recipe_tag::ActiveModel {
        recipe_id: Set(recipe_id),
        tag_id: Set(tag_id),
    };
    recipe_tag::Entity::insert(link)
        .on_conflict(
            OnConflict::columns([recipe_tag::Column::RecipeId, recipe_tag::Column::TagId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    Ok(with_tags(db, recipe_model).await?)
}

/// Unlinks a tag from a recipe. The tag must belong to the user but does not
/// have to be attached.
pub async fn detach_tag<C: ConnectionTrait>(
    db: &C,
    recipe_id: i32,
    tag_id: i32,
    user_id: i32,
) -> Result<RecipeWithTags, RecipeServiceError> {
    let recipe_model = find_owned_recipe(db, recipe_id, user_id).await?;
    tag_service::get_tag_by_id(db, tag_id, user_id)
        .await?
        .ok_or(RecipeServiceError::TagNotFound(tag_id))?;

    recipe_tag::Entity::delete_many()
        .filter(recipe_tag::Column::RecipeId.eq(recipe_id))
        .filter(recipe_tag::Column::TagId.eq(tag_id))
        .exec(db)
        .await?;

    Ok(with_tags(db, recipe_model).await?)
}
