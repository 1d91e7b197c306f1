use serde::{Deserialize, Serialize};

use crate::db::entities::tag;

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PatchTagRequest {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TagListQuery {
    /// `1` limits the list to tags attached to at least one recipe.
    pub assigned_only: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagResponse {
    pub id: i32,
    pub name: String,
}

impl From<tag::Model> for TagResponse {
    fn from(model: tag::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }
}
