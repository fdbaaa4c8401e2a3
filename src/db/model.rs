//! Row models used by repositories.
//!
//! Keep these structs focused on the data stored in the tables. Business
//! logic should live in higher layers.

use crate::model::CatalogEntry;

/// One row of the `podcast` cache table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PodcastRow {
    #[sqlx(rename = "podCastId")]
    pub podcast_id: String,
    pub title: String,
    pub publisher: String,
    #[sqlx(rename = "thumbnailUrl")]
    pub thumbnail_url: String,
    pub description: String,
    #[sqlx(rename = "imageUrl")]
    pub image_url: String,
}

impl From<&CatalogEntry> for PodcastRow {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            podcast_id: entry.id.clone(),
            title: entry.title.clone(),
            publisher: entry.publisher.clone(),
            thumbnail_url: entry.thumbnail.clone(),
            description: entry.description.clone(),
            image_url: entry.image.clone(),
        }
    }
}

impl From<PodcastRow> for CatalogEntry {
    fn from(row: PodcastRow) -> Self {
        CatalogEntry {
            id: row.podcast_id,
            title: row.title,
            publisher: row.publisher,
            thumbnail: row.thumbnail_url,
            description: row.description,
            image: row.image_url,
            ..Default::default()
        }
    }
}
