use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, ModelTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::info;

use crate::db::entities::{recipe_tag, tag};

// --- Tag Service Functions ---

/// Creates a new tag for a user.
pub async fn create_tag<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    name: &str,
) -> Result<tag::Model, DbErr> {
    let new_tag = tag::ActiveModel {
        user_id: Set(user_id),
        name: Set(name.to_owned()),
        ..Default::default()
    };
    let tag_model = new_tag.insert(db).await?;
    info!(user_id, tag_id = tag_model.id, "Created tag.");
    Ok(tag_model)
}

/// Retrieves the tags owned by a user, ordered by name descending.
///
/// With `assigned_only` set, only tags linked to at least one recipe are
/// returned. The subquery keeps each tag unique however many recipes use it.
pub async fn get_tags_by_user_id<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    assigned_only: bool,
) -> Result<Vec<tag::Model>, DbErr> {
    let mut query = tag::Entity::find().filter(tag::Column::UserId.eq(user_id));

    if assigned_only {
        query = query.filter(
            tag::Column::Id.in_subquery(
                Query::select()
                    .column(recipe_tag::Column::TagId)
                    .from(recipe_tag::Entity)
                    .to_owned(),
            ),
        );
    }

    query
        .order_by_desc(tag::Column::Name)
        .order_by_desc(tag::Column::Id)
        .all(db)
        .await
}

/// Retrieves a tag only if it belongs to the given user.
pub async fn get_tag_by_id<C: ConnectionTrait>(
    db: &C,
    tag_id: i32,
    user_id: i32,
) -> Result<Option<tag::Model>, DbErr> {
    tag::Entity::find_by_id(tag_id)
        .filter(tag::Column::UserId.eq(user_id))
        .one(db)
        .await
}

/// Renames a tag. `None` means the tag does not exist or is owned by
/// someone else; a `None` name leaves the tag untouched.
pub async fn update_tag<C: ConnectionTrait>(
    db: &C,
    tag_id: i32,
    user_id: i32,
    name: Option<String>,
) -> Result<Option<tag::Model>, DbErr> {
    let Some(tag_model) = get_tag_by_id(db, tag_id, user_id).await? else {
        return Ok(None);
    };

    let Some(name) = name else {
        return Ok(Some(tag_model));
    };

    let mut active_tag = tag_model.into_active_model();
    active_tag.name = Set(name);
    Ok(Some(active_tag.update(db).await?))
}

/// Deletes a tag and detaches it from every recipe. Returns the number of
/// tags removed, which is zero when the user does not own the tag.
pub async fn delete_tag(db: &DatabaseConnection, tag_id: i32, user_id: i32) -> Result<u64, DbErr> {
    let txn = db.begin().await?;

    let Some(tag_model) = get_tag_by_id(&txn, tag_id, user_id).await? else {
        return Ok(0);
    };

    recipe_tag::Entity::delete_many()
        .filter(recipe_tag::Column::TagId.eq(tag_id))
        .exec(&txn)
        .await?;
    let rows_affected = tag_model.delete(&txn).await?.rows_affected;

    txn.commit().await?;

    info!(user_id, tag_id, "Deleted tag.");
    Ok(rows_affected)
}

/// Returns the user's tag with this exact name, creating it when missing.
pub async fn get_or_create_tag<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    name: &str,
) -> Result<tag::Model, DbErr> {
    let existing = tag::Entity::find()
        .filter(tag::Column::UserId.eq(user_id))
        .filter(tag::Column::Name.eq(name))
        .order_by_asc(tag::Column::Id)
        .one(db)
        .await?;

    match existing {
        Some(tag_model) => Ok(tag_model),
        None => create_tag(db, user_id, name).await,
    }
}
