//! Remote fetcher for the `best_podcasts` catalog endpoint.
//!
//! Every outcome is folded into `Result<Page, TransportError>`; no reqwest or
//! serde error escapes this module.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::TransportError;
use crate::model::{CatalogEntry, Page, PageMeta};

const BEST_PODCASTS_PATH: &str = "best_podcasts";

/// Source of catalog pages. `page == None` requests the first page.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn fetch_page(&self, page: Option<u32>) -> Result<Page, TransportError>;
}

#[derive(Clone)]
pub struct CatalogClient {
    http: Client,
    base_url: Url,
}

impl fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl CatalogClient {
    pub fn new(base_url: Url, timeout: Duration, user_agent: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .no_proxy()
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self { http, base_url })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_url = cfg.base_url()?;
        Self::new(base_url, cfg.timeout(), &cfg.api.user_agent)
    }

    pub fn build_request(&self, page: Option<u32>) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join(BEST_PODCASTS_PATH)
            .context("invalid catalog base URL")?;
        let mut req = self.http.get(endpoint);
        if let Some(page) = page {
            req = req.query(&[("page", page)]);
        }
        req.build().context("failed to build catalog request")
    }

    async fn execute_fetch(&self, page: Option<u32>) -> Result<Page, TransportError> {
        let request = self.build_request(page).map_err(TransportError::local)?;
        debug!(url = %request.url(), "fetching catalog page");

        let res = match self.http.execute(request).await {
            Ok(res) => res,
            Err(err) => {
                warn!(?err, ?page, "catalog request failed");
                return Err(TransportError::local(err));
            }
        };

        let status = res.status();
        let url = res.url().to_string();
        if !status.is_success() {
            warn!(%status, %url, "catalog API returned an error status");
            return Err(TransportError::new(
                i32::from(status.as_u16()),
                status.canonical_reason().unwrap_or("request failed"),
            ));
        }

        let body = res.bytes().await.map_err(TransportError::local)?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(TransportError::new(
                i32::from(status.as_u16()),
                "empty response body",
            ));
        }
        let parsed: Option<BestPodcastsResponse> =
            serde_json::from_slice(&body).map_err(TransportError::local)?;
        let Some(parsed) = parsed else {
            return Err(TransportError::new(
                i32::from(status.as_u16()),
                "empty response body",
            ));
        };

        let page = parsed.into_page(url);
        debug!(size = page.meta.size, page = page.meta.page, "catalog page received");
        Ok(page)
    }
}

#[async_trait]
impl RemoteSource for CatalogClient {
    async fn fetch_page(&self, page: Option<u32>) -> Result<Page, TransportError> {
        self.execute_fetch(page).await
    }
}

/// Body of `GET /best_podcasts`. Every field is optional on the wire.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BestPodcastsResponse {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub total: Option<u32>,
    pub has_next: Option<bool>,
    pub podcasts: Option<Vec<CatalogEntry>>,
    pub parent_id: Option<i64>,
    pub page_number: Option<u32>,
    pub has_previous: Option<bool>,
    pub listennotes_url: Option<String>,
    pub next_page_number: Option<u32>,
    pub previous_page_number: Option<u32>,
}

impl BestPodcastsResponse {
    pub fn into_page(self, url: String) -> Page {
        let entries = self.podcasts.unwrap_or_default();
        let prev_key = self
            .has_previous
            .unwrap_or(false)
            .then_some(self.previous_page_number)
            .flatten();
        let next_key = self
            .has_next
            .unwrap_or(false)
            .then_some(self.next_page_number)
            .flatten();
        Page {
            meta: PageMeta {
                size: entries.len(),
                page: self.page_number.unwrap_or(0),
                total: self.total.unwrap_or(0),
            },
            entries,
            prev_key,
            next_key,
            url,
        }
    }
}
