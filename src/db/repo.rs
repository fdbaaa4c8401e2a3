use super::model::PodcastRow;
use crate::model::{CatalogEntry, FavoriteSet};
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let options = SqliteConnectOptions::from_str(&normalized)
        .with_context(|| format!("invalid database url {}", normalized))?
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options)
        .await
        .with_context(|| format!("failed to open database {}", normalized))?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// Single-connection in-memory pool with migrations applied.
pub async fn memory_pool() -> Result<Pool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// Expand a leading `~/` in file-backed SQLite URLs and create the parent
/// directory. In-memory and non-sqlite URLs pass through untouched.
fn prepare_sqlite_url(url: &str) -> String {
    let Some(rest) = url.strip_prefix("sqlite:") else {
        return url.to_string();
    };
    if rest.starts_with(":memory") {
        return url.to_string();
    }
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let (path, query) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    if path.is_empty() {
        return url.to_string();
    }

    let path = match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(tail), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), tail),
        _ => path.to_string(),
    };
    if let Some(parent) = Path::new(&path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    match query {
        Some(q) => format!("sqlite://{}?{}", path, q),
        None => format!("sqlite://{}", path),
    }
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const UPSERT_PODCAST: &str = "INSERT INTO podcast (podCastId, title, publisher, thumbnailUrl, description, imageUrl) \
     VALUES (?, ?, ?, ?, ?, ?) \
     ON CONFLICT(podCastId) DO UPDATE SET \
     title = excluded.title, publisher = excluded.publisher, thumbnailUrl = excluded.thumbnailUrl, \
     description = excluded.description, imageUrl = excluded.imageUrl";

async fn upsert_catalog_entries_tx(
    tx: &mut Transaction<'_, Sqlite>,
    entries: &[CatalogEntry],
) -> Result<()> {
    for entry in entries {
        let row = PodcastRow::from(entry);
        sqlx::query(UPSERT_PODCAST)
            .bind(&row.podcast_id)
            .bind(&row.title)
            .bind(&row.publisher)
            .bind(&row.thumbnail_url)
            .bind(&row.description)
            .bind(&row.image_url)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

/// Insert or overwrite entries by id. The whole batch commits atomically.
#[instrument(skip_all, fields(count = entries.len()))]
pub async fn upsert_catalog_entries(pool: &Pool, entries: &[CatalogEntry]) -> Result<()> {
    let mut tx = pool.begin().await?;
    upsert_catalog_entries_tx(&mut tx, entries).await?;
    tx.commit().await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn clear_catalog(pool: &Pool) -> Result<()> {
    sqlx::query("DELETE FROM podcast").execute(pool).await?;
    Ok(())
}

/// Clear and rewrite the catalog inside one transaction.
#[instrument(skip_all, fields(count = entries.len()))]
pub async fn replace_catalog(pool: &Pool, entries: &[CatalogEntry]) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM podcast").execute(&mut *tx).await?;
    upsert_catalog_entries_tx(&mut tx, entries).await?;
    tx.commit().await?;
    Ok(())
}

/// Full catalog snapshot in insertion order.
#[instrument(skip_all)]
pub async fn read_all_catalog_entries(pool: &Pool) -> Result<Vec<CatalogEntry>> {
    let rows: Vec<PodcastRow> = sqlx::query_as(
        "SELECT podCastId, title, publisher, thumbnailUrl, description, imageUrl FROM podcast ORDER BY rowid",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(CatalogEntry::from).collect())
}

#[instrument(skip_all)]
pub async fn count_catalog_entries(pool: &Pool) -> Result<i64> {
    let cnt: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM podcast")
        .fetch_one(pool)
        .await?;
    Ok(cnt)
}

#[instrument(skip_all)]
pub async fn add_favorite(pool: &Pool, podcast_id: &str) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO favorite_podcasts (podcastId) VALUES (?)")
        .bind(podcast_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn remove_favorite(pool: &Pool, podcast_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM favorite_podcasts WHERE podcastId = ?")
        .bind(podcast_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn favorite_ids(pool: &Pool) -> Result<FavoriteSet> {
    let ids: Vec<String> = sqlx::query_scalar("SELECT podcastId FROM favorite_podcasts")
        .fetch_all(pool)
        .await?;
    Ok(ids.into_iter().collect())
}
