//! Persistent store: the catalog cache and favorite marks behind one handle.
//!
//! All SQL lives in `crate::db`; this layer adds change notification so
//! that every committed favorite mutation publishes the full recomputed set
//! to subscribers.

use crate::db::{self, Pool};
use crate::model::{CatalogEntry, FavoriteSet};
use anyhow::Result;
use futures::stream::{self, Stream};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::debug;

#[derive(Clone)]
pub struct LocalStore {
    pool: Pool,
    favorites: Arc<watch::Sender<FavoriteSet>>,
    /// Serializes favorite write, re-read and publish.
    favorites_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("favorites", &*self.favorites.borrow())
            .finish_non_exhaustive()
    }
}

impl LocalStore {
    /// Wrap an already-migrated pool, seeding the favorite channel from disk.
    pub async fn open(pool: Pool) -> Result<Self> {
        let current = db::favorite_ids(&pool).await?;
        let (tx, _rx) = watch::channel(current);
        Ok(Self {
            pool,
            favorites: Arc::new(tx),
            favorites_lock: Arc::new(Mutex::new(())),
        })
    }

    pub async fn upsert_catalog_entries(&self, entries: &[CatalogEntry]) -> Result<()> {
        db::upsert_catalog_entries(&self.pool, entries).await
    }

    pub async fn clear_catalog(&self) -> Result<()> {
        db::clear_catalog(&self.pool).await
    }

    /// Clear and rewrite the catalog as one transaction.
    pub async fn replace_catalog(&self, entries: &[CatalogEntry]) -> Result<()> {
        db::replace_catalog(&self.pool, entries).await
    }

    pub async fn read_all_catalog_entries(&self) -> Result<Vec<CatalogEntry>> {
        db::read_all_catalog_entries(&self.pool).await
    }

    pub async fn add_favorite(&self, podcast_id: &str) -> Result<()> {
        let _guard = self.favorites_lock.lock().await;
        db::add_favorite(&self.pool, podcast_id).await?;
        self.publish_favorites().await
    }

    pub async fn remove_favorite(&self, podcast_id: &str) -> Result<()> {
        let _guard = self.favorites_lock.lock().await;
        db::remove_favorite(&self.pool, podcast_id).await?;
        self.publish_favorites().await
    }

    /// Re-read the favorite table after a committed write and broadcast it.
    /// Callers hold `favorites_lock`, so sets are published in commit order.
    async fn publish_favorites(&self) -> Result<()> {
        let current = db::favorite_ids(&self.pool).await?;
        debug!(count = current.len(), "publishing favorite set");
        self.favorites.send_replace(current);
        Ok(())
    }

    /// Handle that always holds the latest favorite set.
    pub fn subscribe_favorites(&self) -> watch::Receiver<FavoriteSet> {
        self.favorites.subscribe()
    }

    /// Stream of full favorite sets: the current set first, then one per
    /// mutation. Each call starts a fresh subscription.
    pub fn observe_favorite_ids(&self) -> impl Stream<Item = FavoriteSet> + Send + 'static {
        favorite_stream(self.subscribe_favorites())
    }
}

/// Turn a watch receiver into a stream that yields the current value first.
pub fn favorite_stream(
    rx: watch::Receiver<FavoriteSet>,
) -> impl Stream<Item = FavoriteSet> + Send + 'static {
    stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let current = rx.borrow_and_update().clone();
        Some((current, (rx, false)))
    })
}
