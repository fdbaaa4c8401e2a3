//! Sequential page loading on top of [`PodsRepository::fetch_page`].
//!
//! [`PagingSource`] turns one repository call into a keyed page using plain
//! token arithmetic. [`Pager`] owns the loaded pages and the refresh /
//! prepend / append load states a list screen renders.
//!
//! Loads are plain futures: dropping one cancels it, leaving the
//! corresponding state at `Loading` until the next request overwrites it.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::error::TransportError;
use crate::model::CatalogEntry;
use crate::repository::PodsRepository;

pub type PageKey = u32;

pub const FIRST_PAGE: PageKey = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPage {
    pub key: PageKey,
    pub data: Vec<CatalogEntry>,
    pub prev_key: Option<PageKey>,
    pub next_key: Option<PageKey>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadResult {
    Page(LoadedPage),
    Error(TransportError),
}

/// Cursors of the page closest to what the user last looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Anchor {
    pub prev_key: Option<PageKey>,
    pub next_key: Option<PageKey>,
}

impl From<&LoadedPage> for Anchor {
    fn from(page: &LoadedPage) -> Self {
        Self {
            prev_key: page.prev_key,
            next_key: page.next_key,
        }
    }
}

/// Neighbour keys of `requested`: no previous key on the first page, no
/// next key once a page comes back empty.
pub fn neighbour_keys(requested: PageKey, is_empty: bool) -> (Option<PageKey>, Option<PageKey>) {
    let prev = if requested == FIRST_PAGE {
        None
    } else {
        requested.checked_sub(1)
    };
    let next = if is_empty {
        None
    } else {
        requested.checked_add(1)
    };
    (prev, next)
}

/// Key to restart from so a refresh lands on the page the user was viewing.
pub fn refresh_key(anchor: Option<Anchor>) -> Option<PageKey> {
    let anchor = anchor?;
    anchor
        .prev_key
        .and_then(|k| k.checked_add(1))
        .or_else(|| anchor.next_key.and_then(|k| k.checked_sub(1)))
}

#[derive(Clone)]
pub struct PagingSource {
    repository: Arc<dyn PodsRepository>,
}

impl std::fmt::Debug for PagingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagingSource").finish_non_exhaustive()
    }
}

impl PagingSource {
    pub fn new(repository: Arc<dyn PodsRepository>) -> Self {
        Self { repository }
    }

    /// Load one page. `None` asks the repository for its first page.
    #[instrument(skip(self))]
    pub async fn load(&self, key: Option<PageKey>) -> LoadResult {
        let requested = key.unwrap_or(FIRST_PAGE);
        match self.repository.fetch_page(key).await {
            Ok(data) => {
                let (prev_key, next_key) = neighbour_keys(requested, data.is_empty());
                debug!(requested, size = data.len(), ?next_key, "page loaded");
                LoadResult::Page(LoadedPage {
                    key: requested,
                    data,
                    prev_key,
                    next_key,
                })
            }
            Err(err) => {
                warn!(requested, %err, "page load failed");
                LoadResult::Error(err)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    NotLoading { end_reached: bool },
    Loading,
    Error(TransportError),
}

impl LoadState {
    const IDLE: LoadState = LoadState::NotLoading { end_reached: false };

    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }

    pub fn error(&self) -> Option<&TransportError> {
        match self {
            LoadState::Error(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadRequest {
    Refresh(Option<PageKey>),
    Prepend(PageKey),
    Append(PageKey),
}

/// Which kind of load a [`Pager`] call performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    Refresh,
    Prepend,
    Append,
}

impl LoadRequest {
    fn kind(&self) -> LoadKind {
        match self {
            LoadRequest::Refresh(_) => LoadKind::Refresh,
            LoadRequest::Prepend(_) => LoadKind::Prepend,
            LoadRequest::Append(_) => LoadKind::Append,
        }
    }
}

#[derive(Debug)]
pub struct Pager {
    source: PagingSource,
    pages: Vec<LoadedPage>,
    refresh: LoadState,
    prepend: LoadState,
    append: LoadState,
    failed: Option<LoadRequest>,
    anchor_page: Option<usize>,
}

impl Pager {
    pub fn new(source: PagingSource) -> Self {
        Self {
            source,
            pages: Vec::new(),
            refresh: LoadState::IDLE,
            prepend: LoadState::IDLE,
            append: LoadState::IDLE,
            failed: None,
            anchor_page: None,
        }
    }

    pub fn pages(&self) -> &[LoadedPage] {
        &self.pages
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.pages.iter().flat_map(|p| p.data.iter())
    }

    pub fn item_count(&self) -> usize {
        self.pages.iter().map(|p| p.data.len()).sum()
    }

    pub fn refresh_state(&self) -> &LoadState {
        &self.refresh
    }

    pub fn prepend_state(&self) -> &LoadState {
        &self.prepend
    }

    pub fn append_state(&self) -> &LoadState {
        &self.append
    }

    /// Kind of the most recent failed load still waiting for a retry.
    pub fn pending_retry(&self) -> Option<LoadKind> {
        self.failed.map(|r| r.kind())
    }

    /// Record the item the user last looked at; its page becomes the anchor.
    pub fn set_anchor_position(&mut self, position: usize) {
        let mut seen = 0;
        for (idx, page) in self.pages.iter().enumerate() {
            seen += page.data.len();
            if position < seen {
                self.anchor_page = Some(idx);
                return;
            }
        }
        // Past the end: the closest page is the last one.
        self.anchor_page = self.pages.len().checked_sub(1);
    }

    pub fn anchor(&self) -> Option<Anchor> {
        self.anchor_page
            .and_then(|idx| self.pages.get(idx))
            .map(Anchor::from)
    }

    /// Drop every page and load the first page.
    pub async fn reload(&mut self) -> &LoadState {
        self.anchor_page = None;
        self.run(LoadRequest::Refresh(None)).await;
        &self.refresh
    }

    /// Drop every page and reload around the anchor, or from the first page
    /// when no anchor is recorded.
    pub async fn refresh(&mut self) -> &LoadState {
        let key = refresh_key(self.anchor());
        self.anchor_page = None;
        self.run(LoadRequest::Refresh(key)).await;
        &self.refresh
    }

    /// Load the page after the last loaded one. Returns `false` when nothing
    /// was requested (no pages yet, a refresh pending, or end reached).
    pub async fn load_more(&mut self) -> bool {
        if !matches!(self.refresh, LoadState::NotLoading { .. }) || self.append.is_loading() {
            return false;
        }
        let Some(last) = self.pages.last() else {
            return false;
        };
        match last.next_key {
            Some(next) => {
                self.run(LoadRequest::Append(next)).await;
                true
            }
            None => {
                self.append = LoadState::NotLoading { end_reached: true };
                false
            }
        }
    }

    /// Load the page before the first loaded one, if any.
    pub async fn load_previous(&mut self) -> bool {
        if !matches!(self.refresh, LoadState::NotLoading { .. }) || self.prepend.is_loading() {
            return false;
        }
        let Some(first) = self.pages.first() else {
            return false;
        };
        match first.prev_key {
            Some(prev) => {
                self.run(LoadRequest::Prepend(prev)).await;
                true
            }
            None => {
                self.prepend = LoadState::NotLoading { end_reached: true };
                false
            }
        }
    }

    /// Re-issue the most recent failed load, keeping loaded pages.
    pub async fn retry(&mut self) -> Option<LoadKind> {
        let request = self.failed.take()?;
        self.run(request).await;
        Some(request.kind())
    }

    async fn run(&mut self, request: LoadRequest) {
        match request {
            LoadRequest::Refresh(key) => {
                self.pages.clear();
                self.failed = None;
                self.prepend = LoadState::IDLE;
                self.append = LoadState::IDLE;
                self.refresh = LoadState::Loading;
                match self.source.load(key).await {
                    LoadResult::Page(page) => {
                        self.prepend = LoadState::NotLoading {
                            end_reached: page.prev_key.is_none(),
                        };
                        self.append = LoadState::NotLoading {
                            end_reached: page.next_key.is_none(),
                        };
                        self.pages.push(page);
                        self.refresh = LoadState::IDLE;
                    }
                    LoadResult::Error(err) => {
                        self.refresh = LoadState::Error(err);
                        self.failed = Some(request);
                    }
                }
            }
            LoadRequest::Prepend(key) => {
                self.prepend = LoadState::Loading;
                match self.source.load(Some(key)).await {
                    LoadResult::Page(page) => {
                        self.prepend = LoadState::NotLoading {
                            end_reached: page.prev_key.is_none(),
                        };
                        self.pages.insert(0, page);
                        if let Some(idx) = self.anchor_page.as_mut() {
                            *idx += 1;
                        }
                        self.clear_failed(LoadKind::Prepend);
                    }
                    LoadResult::Error(err) => {
                        self.prepend = LoadState::Error(err);
                        self.failed = Some(request);
                    }
                }
            }
            LoadRequest::Append(key) => {
                self.append = LoadState::Loading;
                match self.source.load(Some(key)).await {
                    LoadResult::Page(page) => {
                        self.append = LoadState::NotLoading {
                            end_reached: page.next_key.is_none(),
                        };
                        self.pages.push(page);
                        self.clear_failed(LoadKind::Append);
                    }
                    LoadResult::Error(err) => {
                        self.append = LoadState::Error(err);
                        self.failed = Some(request);
                    }
                }
            }
        }
    }

    fn clear_failed(&mut self, kind: LoadKind) {
        if self.failed.map(|r| r.kind()) == Some(kind) {
            self.failed = None;
        }
    }
}
