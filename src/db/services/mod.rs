//! The `services` module provides a high-level API for interacting with the database.
//! It encapsulates the query logic and data access patterns, allowing the HTTP
//! handlers to work with domain models without knowing the underlying schema.
//!
//! Every function takes the connection explicitly and every query touching
//! recipes or tags is scoped to the owning user. All public items from the
//! sub-modules are re-exported here under `crate::db::services::`.

pub mod recipe_service;
pub mod tag_service;
pub mod user_service;

pub use recipe_service::*;
pub use tag_service::*;
pub use user_service::*;
