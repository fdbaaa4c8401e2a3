//! View-state controller for the podcast list.
//!
//! Owns the pager plus three pieces of observable state: the refreshing
//! flag, the highlighted podcast and a queue of paging intents. Observers
//! get read-only `watch::Receiver` handles; only the controller writes.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument};

use crate::error::TransportError;
use crate::model::{FavoriteSet, PodcastItem};
use crate::paging::{LoadKind, LoadState, Pager, PagingSource};
use crate::repository::PodsRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingIntent {
    /// Fetch the whole list again from the first page.
    Reload,
    /// Pull-to-refresh: like `Reload`, with the refreshing flag raised.
    Refresh,
    /// Re-issue the most recent failed load.
    Retry,
}

pub struct PodcastViewModel {
    repository: Arc<dyn PodsRepository>,
    pager: Pager,
    favorites: watch::Receiver<FavoriteSet>,
    is_refreshing: watch::Sender<bool>,
    highlighted: watch::Sender<Option<PodcastItem>>,
    intents_tx: mpsc::UnboundedSender<PagingIntent>,
    intents_rx: mpsc::UnboundedReceiver<PagingIntent>,
    notification: Option<TransportError>,
}

impl std::fmt::Debug for PodcastViewModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PodcastViewModel")
            .field("pager", &self.pager)
            .field("is_refreshing", &*self.is_refreshing.borrow())
            .field("notification", &self.notification)
            .finish_non_exhaustive()
    }
}

/// Holds `is_refreshing` up for as long as it lives, including when the
/// refresh future is dropped mid-load.
struct RefreshingFlag<'a>(&'a watch::Sender<bool>);

impl<'a> RefreshingFlag<'a> {
    fn raise(flag: &'a watch::Sender<bool>) -> Self {
        flag.send_replace(true);
        Self(flag)
    }
}

impl Drop for RefreshingFlag<'_> {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

impl PodcastViewModel {
    /// Build the controller and queue the initial `Reload`.
    pub fn new(repository: Arc<dyn PodsRepository>) -> Self {
        let pager = Pager::new(PagingSource::new(repository.clone()));
        let favorites = repository.subscribe_favorites();
        let (intents_tx, intents_rx) = mpsc::unbounded_channel();
        let vm = Self {
            repository,
            pager,
            favorites,
            is_refreshing: watch::channel(false).0,
            highlighted: watch::channel(None).0,
            intents_tx,
            intents_rx,
            notification: None,
        };
        vm.send_intent(PagingIntent::Reload);
        vm
    }

    pub fn is_refreshing(&self) -> watch::Receiver<bool> {
        self.is_refreshing.subscribe()
    }

    pub fn highlighted(&self) -> watch::Receiver<Option<PodcastItem>> {
        self.highlighted.subscribe()
    }

    /// Sender other tasks can use to queue intents.
    pub fn intents(&self) -> mpsc::UnboundedSender<PagingIntent> {
        self.intents_tx.clone()
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    fn send_intent(&self, intent: PagingIntent) {
        // The receiver lives in `self`, so the channel cannot be closed here.
        let _ = self.intents_tx.send(intent);
    }

    pub fn on_pull_to_refresh(&self) {
        self.send_intent(PagingIntent::Refresh);
    }

    pub fn on_retry(&self) {
        self.send_intent(PagingIntent::Retry);
    }

    pub fn on_reload(&self) {
        self.send_intent(PagingIntent::Reload);
    }

    /// Handle every queued intent in order. Returns how many were handled.
    pub async fn process_pending_intents(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(intent) = self.intents_rx.try_recv() {
            self.handle_intent(intent).await;
            handled += 1;
        }
        handled
    }

    /// Wait for the next intent and handle it; `false` once every sender is gone.
    pub async fn process_next_intent(&mut self) -> bool {
        match self.intents_rx.recv().await {
            Some(intent) => {
                self.handle_intent(intent).await;
                true
            }
            None => false,
        }
    }

    #[instrument(skip(self))]
    pub async fn handle_intent(&mut self, intent: PagingIntent) {
        match intent {
            PagingIntent::Reload => {
                let state = self.pager.reload().await.clone();
                self.note_failure(LoadKind::Refresh, &state);
            }
            PagingIntent::Refresh => {
                let refreshing = RefreshingFlag::raise(&self.is_refreshing);
                let state = self.pager.refresh().await.clone();
                drop(refreshing);
                self.note_failure(LoadKind::Refresh, &state);
            }
            PagingIntent::Retry => match self.pager.retry().await {
                Some(kind) => {
                    let state = self.state_for(kind).clone();
                    self.note_failure(kind, &state);
                }
                None => debug!("retry requested with no failed load"),
            },
        }
    }

    /// Append the next page when the list is scrolled to its end.
    pub async fn load_more(&mut self) -> bool {
        let requested = self.pager.load_more().await;
        if requested {
            let state = self.pager.append_state().clone();
            self.note_failure(LoadKind::Append, &state);
        }
        requested
    }

    pub fn on_item_visible(&mut self, position: usize) {
        self.pager.set_anchor_position(position);
    }

    fn state_for(&self, kind: LoadKind) -> &LoadState {
        match kind {
            LoadKind::Refresh => self.pager.refresh_state(),
            LoadKind::Prepend => self.pager.prepend_state(),
            LoadKind::Append => self.pager.append_state(),
        }
    }

    fn note_failure(&mut self, kind: LoadKind, state: &LoadState) {
        match state.error() {
            Some(err) => {
                info!(?kind, %err, "load failed; retry available");
                self.notification = Some(err.clone());
            }
            None => self.notification = None,
        }
    }

    /// Error to show as a dismissible notification, if any.
    pub fn notification(&self) -> Option<&TransportError> {
        self.notification.as_ref()
    }

    pub fn dismiss_notification(&mut self) {
        self.notification = None;
    }

    /// Loaded entries joined with the current favorite set.
    pub fn items(&self) -> Vec<PodcastItem> {
        let favorites = self.favorites.borrow();
        self.pager
            .entries()
            .cloned()
            .map(|entry| PodcastItem::annotate(entry, &favorites))
            .collect()
    }

    pub fn favorite_ids(&self) -> FavoriteSet {
        self.favorites.borrow().clone()
    }

    /// Flip the favorite mark using the item's current flag. Loaded items
    /// pick up the change through the favorite subscription.
    pub async fn toggle_favorite(&self, item: &PodcastItem) -> Result<()> {
        self.repository
            .toggle_favorite(item.id(), item.is_favorite)
            .await
    }

    pub fn select(&self, item: PodcastItem) {
        self.highlighted.send_replace(Some(item));
    }

    pub fn clear_selection(&self) {
        self.highlighted.send_replace(None);
    }
}
