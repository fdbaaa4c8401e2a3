//! Database module: row models and SQL repositories.
//!
//! This module is split into two submodules:
//! - `model`: row structs mapped from the cache tables.
//! - `repo`: SQL-only functions over the catalog and favorite tables.
//!
//! Change notification for favorites lives one layer up, in `crate::store`.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::PodcastRow;
