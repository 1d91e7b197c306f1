//! Table bootstrap from the entity definitions.
//!
//! Tables are created in dependency order so that foreign keys always point
//! at an existing table. Existing tables are left untouched.

use sea_orm::{ConnectionTrait, DbErr, EntityName, EntityTrait, Schema};
use tracing::debug;

use crate::db::entities::{recipe, recipe_tag, tag, user};

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    let backend = db.get_database_backend();
    db.execute(backend.build(&stmt)).await?;
    debug!(table = entity.table_name(), "Ensured table exists.");
    Ok(())
}

/// Creates every table the service needs if it does not already exist.
pub async fn create_tables<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, user::Entity).await?;
    create_table(db, &schema, tag::Entity).await?;
    create_table(db, &schema, recipe::Entity).await?;
    create_table(db, &schema, recipe_tag::Entity).await?;

    Ok(())
}
