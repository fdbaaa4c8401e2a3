use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Full set of favorite podcast ids at one point in time.
pub type FavoriteSet = BTreeSet<String>;

/// How a non-empty remote page is written into the catalog cache.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WritePolicy {
    /// Clear the catalog table, then upsert the page's entries.
    #[default]
    Replace,
    /// Upsert the page's entries on top of whatever is cached.
    Append,
}

impl WritePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            WritePolicy::Replace => "replace",
            WritePolicy::Append => "append",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct LookingFor {
    pub guests: bool,
    pub cohosts: bool,
    pub sponsors: bool,
    pub cross_promotion: bool,
}

/// Outbound links the catalog publishes for a podcast.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Extra {
    pub url1: String,
    pub url2: String,
    pub url3: String,
    pub spotify_url: String,
    pub youtube_url: String,
    pub linkedin_url: String,
    pub wechat_handle: String,
    pub patreon_handle: String,
    pub twitter_handle: String,
    pub facebook_handle: String,
    pub amazon_music_url: String,
    pub instagram_handle: String,
}

/// A podcast as returned by the catalog API.
///
/// Entries read back from the local cache only carry the persisted columns
/// (id, title, publisher, description, thumbnail, image); every other field
/// holds its default value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct CatalogEntry {
    pub id: String,
    pub title: String,
    pub publisher: String,
    pub description: String,
    pub image: String,
    pub thumbnail: String,
    pub rss: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub email: String,
    pub website: String,
    pub language: String,
    pub country: String,
    pub extra: Option<Extra>,
    pub genre_ids: Vec<i64>,
    pub itunes_id: i64,
    pub is_claimed: bool,
    pub looking_for: Option<LookingFor>,
    pub has_sponsors: bool,
    pub listen_score: i64,
    pub total_episodes: i64,
    #[serde(rename = "listennotes_url")]
    pub listen_notes_url: String,
    pub audio_length_sec: i64,
    pub explicit_content: bool,
    pub latest_episode_id: String,
    pub latest_pub_date_ms: i64,
    pub earliest_pub_date_ms: i64,
    pub has_guest_interviews: bool,
    pub update_frequency_hours: i64,
    pub listen_score_global_rank: String,
}

impl CatalogEntry {
    pub fn latest_published(&self) -> Option<DateTime<Utc>> {
        millis_to_utc(self.latest_pub_date_ms)
    }

    pub fn earliest_published(&self) -> Option<DateTime<Utc>> {
        millis_to_utc(self.earliest_pub_date_ms)
    }
}

fn millis_to_utc(ms: i64) -> Option<DateTime<Utc>> {
    if ms <= 0 {
        return None;
    }
    Utc.timestamp_millis_opt(ms).single()
}

/// Response metadata attached to a fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageMeta {
    /// Number of entries in this page.
    pub size: usize,
    /// Page number echoed by the API, 0 when absent.
    pub page: u32,
    /// Catalog size reported by the API, 0 when absent.
    pub total: u32,
}

/// One page of the remote catalog. Transient: only its entries are cached.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub entries: Vec<CatalogEntry>,
    /// Previous page number as reported by the API.
    pub prev_key: Option<u32>,
    /// Next page number as reported by the API.
    pub next_key: Option<u32>,
    pub meta: PageMeta,
    /// Resolved request URL, for diagnostics.
    pub url: String,
}

/// A catalog entry joined with the favorite set at read time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodcastItem {
    pub entry: CatalogEntry,
    pub is_favorite: bool,
}

impl PodcastItem {
    pub fn annotate(entry: CatalogEntry, favorites: &FavoriteSet) -> Self {
        let is_favorite = favorites.contains(&entry.id);
        Self { entry, is_favorite }
    }

    pub fn id(&self) -> &str {
        &self.entry.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_policy_label_matches_serde_name() {
        for policy in [WritePolicy::Replace, WritePolicy::Append] {
            assert_eq!(serde_json::to_value(policy).unwrap(), policy.as_str());
        }
    }

    #[test]
    fn entry_deserializes_partial_json() {
        let entry: CatalogEntry = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "title": "Show",
            "type": "episodic",
            "genre_ids": [68, 82],
            "looking_for": { "guests": true, "cohosts": false, "sponsors": true, "cross_promotion": false },
            "listennotes_url": "https://www.listennotes.com/c/abc/",
            "latest_pub_date_ms": 1_700_000_000_000_i64
        }))
        .unwrap();
        assert_eq!(entry.id, "abc");
        assert_eq!(entry.kind, "episodic");
        assert_eq!(entry.genre_ids, vec![68, 82]);
        assert!(entry.looking_for.unwrap().sponsors);
        assert_eq!(entry.listen_notes_url, "https://www.listennotes.com/c/abc/");
        assert!(entry.extra.is_none());
        assert_eq!(
            entry.latest_published().map(|d| d.timestamp()),
            Some(1_700_000_000)
        );
        assert!(entry.earliest_published().is_none());
    }

    #[test]
    fn annotate_reads_favorite_set() {
        let entry = CatalogEntry {
            id: "x".into(),
            ..Default::default()
        };
        let mut favs = FavoriteSet::new();
        assert!(!PodcastItem::annotate(entry.clone(), &favs).is_favorite);
        favs.insert("x".into());
        assert!(PodcastItem::annotate(entry, &favs).is_favorite);
    }
}
