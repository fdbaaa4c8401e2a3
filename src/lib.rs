//! Offline-first podcast catalog client: paginated remote fetches reconciled
//! with a local SQLite cache, plus favorites that outlive the cache.

pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod paging;
pub mod remote;
pub mod repository;
pub mod store;
pub mod viewmodel;

pub use error::TransportError;
pub use model::{CatalogEntry, FavoriteSet, Page, PageMeta, PodcastItem, WritePolicy};
pub use paging::{Pager, PagingSource};
pub use remote::{CatalogClient, RemoteSource};
pub use repository::{CachePolicy, CatalogRepository, PodsRepository};
pub use store::LocalStore;
pub use viewmodel::{PagingIntent, PodcastViewModel};
