mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{is_open, todo, todo_schema, FlakyStore};
use rindex_repo::{Repository, RepositoryConfig};

async fn seeded(strict: bool) -> Repository {
    let store = Arc::new(FlakyStore::new());
    let config = RepositoryConfig::new("todos", todo_schema()).with_strict_population(strict);
    let repo = Repository::new(config, store.clone());
    for desc in ["a", "b", "c"] {
        repo.set(todo(desc, false)).await.unwrap();
    }
    store.yield_between_ops(true);
    repo
}

#[tokio::test]
async fn concurrent_misses_both_scan_by_default() {
    let repo = seeded(false).await;

    let (left, right) = tokio::join!(repo.find("open", is_open), repo.find("open", is_open));
    assert_eq!(left.unwrap().len(), 3);
    assert_eq!(right.unwrap().len(), 3);
    assert_eq!(repo.stats().full_scans, 2);

    // Both populations appended; reads still return each entity once.
    let cached = repo.indexing().get_indexes("open").await.unwrap();
    assert_eq!(cached.len(), 6);
    assert_eq!(repo.find("open", is_open).await.unwrap().len(), 3);
}

#[tokio::test]
async fn strict_population_scans_once() {
    let repo = seeded(true).await;

    let (left, right) = tokio::join!(repo.find("open", is_open), repo.find("open", is_open));
    assert_eq!(left.unwrap().len(), 3);
    assert_eq!(right.unwrap().len(), 3);
    assert_eq!(repo.stats().full_scans, 1);

    let cached = repo.indexing().get_indexes("open").await.unwrap();
    let unique: HashSet<_> = cached.iter().collect();
    assert_eq!(cached.len(), 3);
    assert_eq!(unique.len(), 3);
}

#[tokio::test]
async fn strict_population_locks_per_key() {
    let repo = seeded(true).await;

    let (open, all) = tokio::join!(repo.find("open", is_open), repo.find("all", |_| true));
    assert_eq!(open.unwrap().len(), 3);
    assert_eq!(all.unwrap().len(), 3);
    assert_eq!(repo.stats().full_scans, 2);
}
