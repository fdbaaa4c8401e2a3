//! Reconciliation of the remote catalog with the local cache.
//!
//! `fetch_page` never fails because of local storage: a cache read that
//! errors counts as an empty snapshot and a cache write that errors is
//! logged while the fresh entries are still returned.

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::error::TransportError;
use crate::model::{CatalogEntry, FavoriteSet, WritePolicy};
use crate::remote::RemoteSource;
use crate::store::{favorite_stream, LocalStore};

/// The data API consumed by the paging source and the view model.
#[async_trait]
pub trait PodsRepository: Send + Sync {
    async fn fetch_page(&self, page: Option<u32>) -> Result<Vec<CatalogEntry>, TransportError>;

    /// Remove the mark when `is_favorite`, add it otherwise.
    async fn toggle_favorite(&self, podcast_id: &str, is_favorite: bool) -> Result<()>;

    fn subscribe_favorites(&self) -> watch::Receiver<FavoriteSet>;

    /// Full favorite set, re-emitted after every mutation.
    fn favorite_ids(&self) -> BoxStream<'static, FavoriteSet> {
        favorite_stream(self.subscribe_favorites()).boxed()
    }
}

/// How fetched pages are written to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CachePolicy {
    pub write: WritePolicy,
    /// Run clear+write as one transaction instead of two calls.
    pub transactional_replace: bool,
}

impl From<&crate::config::Cache> for CachePolicy {
    fn from(cfg: &crate::config::Cache) -> Self {
        Self {
            write: cfg.write_policy,
            transactional_replace: cfg.transactional_replace,
        }
    }
}

#[derive(Debug)]
pub struct CatalogRepository<R> {
    remote: R,
    store: LocalStore,
    policy: CachePolicy,
}

impl<R: RemoteSource> CatalogRepository<R> {
    pub fn new(remote: R, store: LocalStore) -> Self {
        Self::with_policy(remote, store, CachePolicy::default())
    }

    pub fn with_policy(remote: R, store: LocalStore, policy: CachePolicy) -> Self {
        Self {
            remote,
            store,
            policy,
        }
    }

    async fn read_cache(&self) -> Vec<CatalogEntry> {
        match self.store.read_all_catalog_entries().await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(?err, "failed to read catalog cache; treating as empty");
                Vec::new()
            }
        }
    }

    async fn write_cache(&self, entries: &[CatalogEntry]) {
        let res = match (self.policy.write, self.policy.transactional_replace) {
            (WritePolicy::Append, _) => self.store.upsert_catalog_entries(entries).await,
            (WritePolicy::Replace, true) => self.store.replace_catalog(entries).await,
            // Two independent calls: a cancellation in between leaves the cache empty.
            (WritePolicy::Replace, false) => match self.store.clear_catalog().await {
                Ok(()) => self.store.upsert_catalog_entries(entries).await,
                Err(err) => Err(err),
            },
        };
        if let Err(err) = res {
            warn!(?err, policy = self.policy.write.as_str(), "failed to write catalog cache");
        }
    }
}

#[async_trait]
impl<R: RemoteSource> PodsRepository for CatalogRepository<R> {
    #[instrument(skip(self))]
    async fn fetch_page(&self, page: Option<u32>) -> Result<Vec<CatalogEntry>, TransportError> {
        let cached = self.read_cache().await;

        match self.remote.fetch_page(page).await {
            Ok(fetched) if !fetched.entries.is_empty() => {
                self.write_cache(&fetched.entries).await;
                info!(count = fetched.entries.len(), url = %fetched.url, "serving fresh page");
                Ok(fetched.entries)
            }
            Ok(_) => {
                info!(cached = cached.len(), "remote page empty; serving cache");
                Ok(cached)
            }
            Err(err) if !cached.is_empty() => {
                warn!(%err, cached = cached.len(), "remote fetch failed; serving cache");
                Ok(cached)
            }
            Err(err) => {
                warn!(%err, "remote fetch failed with empty cache");
                Err(err)
            }
        }
    }

    #[instrument(skip(self))]
    async fn toggle_favorite(&self, podcast_id: &str, is_favorite: bool) -> Result<()> {
        if is_favorite {
            self.store.remove_favorite(podcast_id).await
        } else {
            self.store.add_favorite(podcast_id).await
        }
    }

    fn subscribe_favorites(&self) -> watch::Receiver<FavoriteSet> {
        self.store.subscribe_favorites()
    }
}
