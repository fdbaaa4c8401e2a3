use std::collections::VecDeque;
use std::sync::Arc;

use futures::StreamExt;
use podshelf::db;
use podshelf::model::{CatalogEntry, Page, PageMeta, WritePolicy};
use podshelf::{
    CachePolicy, CatalogRepository, LocalStore, PodsRepository, RemoteSource, TransportError,
};
use tokio::sync::Mutex;

async fn setup_store() -> LocalStore {
    setup().await.1
}

async fn setup() -> (db::Pool, LocalStore) {
    let pool = db::memory_pool().await.unwrap();
    let store = LocalStore::open(pool.clone()).await.unwrap();
    (pool, store)
}

/// Make every insert of `id` into the catalog table fail.
async fn reject_inserts_of(pool: &db::Pool, id: &str) {
    let sql = format!(
        "CREATE TRIGGER reject_{id} BEFORE INSERT ON podcast WHEN NEW.podCastId = '{id}' \
         BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        id = id
    );
    sqlx::query(&sql).execute(pool).await.unwrap();
}

fn entry(id: &str) -> CatalogEntry {
    CatalogEntry {
        id: id.into(),
        title: format!("Title {}", id),
        publisher: "Publisher".into(),
        description: format!("About {}", id),
        thumbnail: format!("https://cdn/{}/t.jpg", id),
        image: format!("https://cdn/{}/i.jpg", id),
        ..Default::default()
    }
}

fn page(ids: &[&str]) -> Page {
    Page {
        entries: ids.iter().map(|id| entry(id)).collect(),
        meta: PageMeta {
            size: ids.len(),
            ..Default::default()
        },
        url: "mock://best_podcasts".into(),
        ..Default::default()
    }
}

fn ids(entries: &[CatalogEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.id.as_str()).collect()
}

#[derive(Clone, Default)]
struct ScriptedRemote {
    responses: Arc<Mutex<VecDeque<Result<Page, TransportError>>>>,
    calls: Arc<Mutex<Vec<Option<u32>>>>,
    /// Written into the cache when the remote is called.
    inject_on_call: Option<(LocalStore, CatalogEntry)>,
}

impl ScriptedRemote {
    fn with_responses(responses: Vec<Result<Page, TransportError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Default::default()
        }
    }

    async fn calls(&self) -> Vec<Option<u32>> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl RemoteSource for ScriptedRemote {
    async fn fetch_page(&self, page: Option<u32>) -> Result<Page, TransportError> {
        self.calls.lock().await.push(page);
        if let Some((store, extra)) = &self.inject_on_call {
            store.upsert_catalog_entries(&[extra.clone()]).await.unwrap();
        }
        let mut guard = self.responses.lock().await;
        guard.pop_front().unwrap_or_else(|| Ok(Page::default()))
    }
}

async fn cached_ids(store: &LocalStore) -> Vec<String> {
    store
        .read_all_catalog_entries()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.id)
        .collect()
}

#[tokio::test]
async fn fresh_page_is_returned_and_cached() {
    let store = setup_store().await;
    let remote = ScriptedRemote::with_responses(vec![Ok(page(&["a", "b"]))]);
    let repo = CatalogRepository::new(remote.clone(), store.clone());

    let got = repo.fetch_page(None).await.unwrap();
    assert_eq!(ids(&got), vec!["a", "b"]);
    assert_eq!(cached_ids(&store).await, vec!["a", "b"]);
    assert_eq!(remote.calls().await, vec![None]);
}

#[tokio::test]
async fn error_with_cache_serves_cached_entries() {
    for err in [
        TransportError::new(-1, "Something went wrong: timeout"),
        TransportError::new(404, "Not Found"),
        TransportError::new(503, "Service Unavailable"),
    ] {
        let store = setup_store().await;
        store
            .upsert_catalog_entries(&[entry("c1"), entry("c2")])
            .await
            .unwrap();
        let repo = CatalogRepository::new(ScriptedRemote::with_responses(vec![Err(err)]), store);

        let got = repo.fetch_page(Some(2)).await.unwrap();
        assert_eq!(ids(&got), vec!["c1", "c2"]);
    }
}

#[tokio::test]
async fn error_with_empty_cache_propagates_unchanged() {
    let store = setup_store().await;
    let err = TransportError::new(500, "Internal Server Error");
    let remote = ScriptedRemote::with_responses(vec![Err(err.clone())]);
    let repo = CatalogRepository::new(remote, store);

    let got = repo.fetch_page(None).await.unwrap_err();
    assert_eq!(got, err);
    assert_eq!(got.code, 500);
    assert_eq!(got.message, "Internal Server Error");
}

#[tokio::test]
async fn empty_remote_page_falls_back_to_cache() {
    let store = setup_store().await;
    store.upsert_catalog_entries(&[entry("old")]).await.unwrap();
    let remote = ScriptedRemote::with_responses(vec![Ok(page(&[]))]);
    let repo = CatalogRepository::new(remote, store.clone());

    let got = repo.fetch_page(Some(9)).await.unwrap();
    assert_eq!(ids(&got), vec!["old"]);
    // Nothing was cleared.
    assert_eq!(cached_ids(&store).await, vec!["old"]);
}

#[tokio::test]
async fn empty_remote_page_with_empty_cache_is_empty_success() {
    let store = setup_store().await;
    let repo = CatalogRepository::new(ScriptedRemote::with_responses(vec![Ok(page(&[]))]), store);

    let got = repo.fetch_page(None).await.unwrap();
    assert!(got.is_empty());
}

#[tokio::test]
async fn replace_policy_drops_entries_of_earlier_pages() {
    let store = setup_store().await;
    let remote = ScriptedRemote::with_responses(vec![
        Ok(page(&["p1a", "p1b", "shared"])),
        Ok(page(&["shared", "p2a"])),
    ]);
    let repo = CatalogRepository::new(remote, store.clone());

    repo.fetch_page(None).await.unwrap();
    repo.fetch_page(Some(2)).await.unwrap();

    assert_eq!(cached_ids(&store).await, vec!["shared", "p2a"]);
}

#[tokio::test]
async fn transactional_replace_has_same_outcome() {
    let store = setup_store().await;
    store.upsert_catalog_entries(&[entry("stale")]).await.unwrap();
    let policy = CachePolicy {
        write: WritePolicy::Replace,
        transactional_replace: true,
    };
    let repo = CatalogRepository::with_policy(
        ScriptedRemote::with_responses(vec![Ok(page(&["x", "y"]))]),
        store.clone(),
        policy,
    );

    repo.fetch_page(None).await.unwrap();
    assert_eq!(cached_ids(&store).await, vec!["x", "y"]);
}

#[tokio::test]
async fn append_policy_keeps_earlier_pages() {
    let store = setup_store().await;
    let policy = CachePolicy {
        write: WritePolicy::Append,
        transactional_replace: false,
    };
    let remote = ScriptedRemote::with_responses(vec![
        Ok(page(&["p1a", "shared"])),
        Ok(page(&["shared", "p2a"])),
        Err(TransportError::new(-1, "offline")),
    ]);
    let repo = CatalogRepository::with_policy(remote, store.clone(), policy);

    repo.fetch_page(None).await.unwrap();
    let second = repo.fetch_page(Some(2)).await.unwrap();
    assert_eq!(ids(&second), vec!["shared", "p2a"]);
    assert_eq!(cached_ids(&store).await, vec!["p1a", "shared", "p2a"]);

    // Offline fallback now covers both pages.
    let offline = repo.fetch_page(Some(3)).await.unwrap();
    assert_eq!(ids(&offline), vec!["p1a", "shared", "p2a"]);
}

#[tokio::test]
async fn cache_is_read_before_the_network_call() {
    let store = setup_store().await;
    store.upsert_catalog_entries(&[entry("before")]).await.unwrap();
    let remote = ScriptedRemote {
        inject_on_call: Some((store.clone(), entry("during"))),
        ..ScriptedRemote::with_responses(vec![Err(TransportError::new(-1, "offline"))])
    };
    let repo = CatalogRepository::new(remote, store.clone());

    let got = repo.fetch_page(None).await.unwrap();
    assert_eq!(ids(&got), vec!["before"]);
    assert_eq!(cached_ids(&store).await, vec!["before", "during"]);
}

#[tokio::test]
async fn toggling_favorite_never_touches_catalog() {
    let store = setup_store().await;
    store.upsert_catalog_entries(&[entry("a")]).await.unwrap();
    let repo = CatalogRepository::new(ScriptedRemote::default(), store.clone());

    repo.toggle_favorite("X", false).await.unwrap();
    assert_eq!(cached_ids(&store).await, vec!["a"]);
    assert!(repo.subscribe_favorites().borrow().contains("X"));

    repo.toggle_favorite("X", true).await.unwrap();
    assert_eq!(cached_ids(&store).await, vec!["a"]);
    assert!(!repo.subscribe_favorites().borrow().contains("X"));
}

#[tokio::test]
async fn favorite_survives_cache_replacement() {
    let store = setup_store().await;
    let remote = ScriptedRemote::with_responses(vec![Ok(page(&["X", "Y"])), Ok(page(&["Z"]))]);
    let repo = CatalogRepository::new(remote, store.clone());

    repo.fetch_page(None).await.unwrap();
    repo.toggle_favorite("X", false).await.unwrap();
    let fresh = repo.fetch_page(Some(2)).await.unwrap();

    assert_eq!(ids(&fresh), vec!["Z"]);
    assert_eq!(cached_ids(&store).await, vec!["Z"]);
    assert!(repo.subscribe_favorites().borrow().contains("X"));
}

#[tokio::test]
async fn add_twice_remove_once_leaves_unfavorited() {
    let store = setup_store().await;
    store.add_favorite("X").await.unwrap();
    store.add_favorite("X").await.unwrap();
    store.remove_favorite("X").await.unwrap();

    let repo = CatalogRepository::new(ScriptedRemote::default(), store);
    assert!(!repo.subscribe_favorites().borrow().contains("X"));
}

#[tokio::test]
async fn favorite_stream_reemits_full_set_after_each_toggle() {
    let store = setup_store().await;
    let repo = CatalogRepository::new(ScriptedRemote::default(), store);
    let mut updates = repo.favorite_ids();

    assert!(updates.next().await.unwrap().is_empty());

    repo.toggle_favorite("a", false).await.unwrap();
    assert_eq!(updates.next().await.unwrap().len(), 1);

    repo.toggle_favorite("b", false).await.unwrap();
    let set = updates.next().await.unwrap();
    assert!(set.contains("a") && set.contains("b"));

    repo.toggle_favorite("a", true).await.unwrap();
    let set = updates.next().await.unwrap();
    assert_eq!(set.into_iter().collect::<Vec<_>>(), vec!["b".to_string()]);
}

#[tokio::test]
async fn unreadable_cache_counts_as_empty_snapshot() {
    let (pool, store) = setup().await;
    sqlx::query("DROP TABLE podcast").execute(&pool).await.unwrap();
    let err = TransportError::new(503, "Service Unavailable");
    let remote = ScriptedRemote::with_responses(vec![Err(err.clone()), Ok(page(&[]))]);
    let repo = CatalogRepository::new(remote, store);

    assert_eq!(repo.fetch_page(None).await.unwrap_err(), err);
    assert!(repo.fetch_page(Some(2)).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_cache_write_still_returns_fresh_entries() {
    let (pool, store) = setup().await;
    sqlx::query("DROP TABLE podcast").execute(&pool).await.unwrap();
    let repo = CatalogRepository::new(
        ScriptedRemote::with_responses(vec![Ok(page(&["a", "b"]))]),
        store,
    );

    let got = repo.fetch_page(None).await.unwrap();
    assert_eq!(ids(&got), vec!["a", "b"]);
}

#[tokio::test]
async fn failure_between_clear_and_write_leaves_cache_empty() {
    let (pool, store) = setup().await;
    store
        .upsert_catalog_entries(&[entry("old1"), entry("old2")])
        .await
        .unwrap();
    reject_inserts_of(&pool, "bad").await;
    let remote = ScriptedRemote::with_responses(vec![
        Ok(page(&["new", "bad"])),
        Err(TransportError::new(-1, "Something went wrong: offline")),
    ]);
    let repo = CatalogRepository::new(remote, store.clone());

    let fresh = repo.fetch_page(None).await.unwrap();
    assert_eq!(ids(&fresh), vec!["new", "bad"]);
    // The clear committed on its own; the rejected batch did not.
    assert!(cached_ids(&store).await.is_empty());

    let err = repo.fetch_page(Some(2)).await.unwrap_err();
    assert!(err.is_local());
}

#[tokio::test]
async fn transactional_replace_keeps_old_cache_on_failed_write() {
    let (pool, store) = setup().await;
    store
        .upsert_catalog_entries(&[entry("old1"), entry("old2")])
        .await
        .unwrap();
    reject_inserts_of(&pool, "bad").await;
    let policy = CachePolicy {
        write: WritePolicy::Replace,
        transactional_replace: true,
    };
    let remote = ScriptedRemote::with_responses(vec![
        Ok(page(&["new", "bad"])),
        Err(TransportError::new(-1, "Something went wrong: offline")),
    ]);
    let repo = CatalogRepository::with_policy(remote, store.clone(), policy);

    let fresh = repo.fetch_page(None).await.unwrap();
    assert_eq!(ids(&fresh), vec!["new", "bad"]);
    assert_eq!(cached_ids(&store).await, vec!["old1", "old2"]);

    let fallback = repo.fetch_page(Some(2)).await.unwrap();
    assert_eq!(ids(&fallback), vec!["old1", "old2"]);
}
