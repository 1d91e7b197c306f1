use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::services::{NewRecipe, RecipeChanges, RecipeWithTags, recipe_service};
use crate::web::error::AppError;
use crate::web::models::tag_models::TagResponse;
use crate::web::models::validate_text;

#[derive(Debug, Clone, Deserialize)]
pub struct TagNamePayload {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRecipeRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub time_minutes: i32,
    pub price: Decimal,
    #[serde(default)]
    pub link: String,
    pub tags: Option<Vec<TagNamePayload>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PatchRecipeRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
    pub tags: Option<Vec<TagNamePayload>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecipeListQuery {
    /// Comma separated tag ids, e.g. `tags=1,4`.
    pub tags: Option<String>,
}

impl RecipeListQuery {
    pub fn tag_ids(&self) -> Result<Option<Vec<i32>>, AppError> {
        let Some(raw) = self.tags.as_deref() else {
            return Ok(None);
        };
        raw.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<i32>()
                    .map_err(|_| AppError::InvalidInput(format!("Invalid tag id: {part}")))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

fn validate_tag_names(tags: Option<Vec<TagNamePayload>>) -> Result<Option<Vec<String>>, AppError> {
    tags.map(|tags| {
        tags.iter()
            .map(|tag| validate_text("tag name", &tag.name, false))
            .collect::<Result<Vec<_>, _>>()
    })
    .transpose()
}

impl CreateRecipeRequest {
    pub fn into_new_recipe(self) -> Result<NewRecipe, AppError> {
        Ok(NewRecipe {
            title: validate_text("title", &self.title, false)?,
            description: self.description.trim().to_string(),
            time_minutes: self.time_minutes,
            price: recipe_service::validate_price(self.price)?,
            link: validate_text("link", &self.link, true)?,
            tag_names: validate_tag_names(self.tags)?,
        })
    }
}

impl PatchRecipeRequest {
    pub fn into_changes(self) -> Result<RecipeChanges, AppError> {
        Ok(RecipeChanges {
            title: self.title.map(|t| validate_text("title", &t, false)).transpose()?,
            description: self.description.map(|d| d.trim().to_string()),
            time_minutes: self.time_minutes,
            price: self.price.map(recipe_service::validate_price).transpose()?,
            link: self.link.map(|l| validate_text("link", &l, true)).transpose()?,
            tag_names: validate_tag_names(self.tags)?,
        })
    }
}

/// List representation of a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeResponse {
    pub id: i32,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub tags: Vec<TagResponse>,
}

/// Detail representation: the list fields plus the description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDetailResponse {
    #[serde(flatten)]
    pub recipe: RecipeResponse,
    pub description: String,
}

impl From<RecipeWithTags> for RecipeResponse {
    fn from(value: RecipeWithTags) -> Self {
        let mut price = value.recipe.price;
        price.rescale(recipe_service::PRICE_DECIMAL_PLACES);
        Self {
            id: value.recipe.id,
            title: value.recipe.title,
            time_minutes: value.recipe.time_minutes,
            price,
            link: value.recipe.link,
            tags: value.tags.into_iter().map(TagResponse::from).collect(),
        }
    }
}

impl From<RecipeWithTags> for RecipeDetailResponse {
    fn from(mut value: RecipeWithTags) -> Self {
        let description = std::mem::take(&mut value.recipe.description);
        Self {
            recipe: value.into(),
            description,
        }
    }
}
