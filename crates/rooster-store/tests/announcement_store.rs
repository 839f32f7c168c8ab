//! Integration tests for AnnouncementStore.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{at, Harness};
use rooster_store::{
    Announcement, AnnouncementStore, FetchError, FetchOutcome, MemoryStorage, RecordStorage, StorageError,
    StorageResult, StoreError,
};

fn announcement(id: &str, start: &str, end: &str) -> Announcement {
    Announcement {
        id: id.to_string(),
        start: at(start),
        end: at(end),
        title: format!("Announcement {}", id),
        text: String::new(),
    }
}

fn seeded_storage() -> MemoryStorage {
    let storage = MemoryStorage::new();
    let seeded = [
        announcement("current", "2016-09-01T00:00:00Z", "2016-09-30T00:00:00Z"),
        announcement("expired", "2016-08-01T00:00:00Z", "2016-08-10T00:00:00Z"),
        announcement("upcoming", "2016-10-01T00:00:00Z", "2016-10-10T00:00:00Z"),
    ];
    RecordStorage::<Announcement>::save(&storage, &seeded).unwrap();
    storage
}

fn open(harness: &Harness, storage: &MemoryStorage) -> AnnouncementStore {
    AnnouncementStore::open(Box::new(storage.clone()), harness.fetcher.clone(), harness.clock.clone()).unwrap()
}

fn visible_ids(store: &AnnouncementStore) -> Vec<String> {
    store.visible().map(|a| a.id.clone()).collect()
}

struct BrokenStorage;

impl RecordStorage<Announcement> for BrokenStorage {
    fn load_all(&self) -> StorageResult<Vec<Announcement>> {
        Ok(vec![])
    }

    fn save(&self, _records: &[Announcement]) -> StorageResult<()> {
        Err(StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
    }

    fn delete(&self, _ids: &[String]) -> StorageResult<()> {
        Ok(())
    }
}

#[test]
fn test_open_shows_only_valid_announcements() {
    let harness = Harness::new("2016-09-06T12:00:00Z");
    let store = open(&harness, &seeded_storage());

    assert_eq!(store.len(), 3);
    assert_eq!(visible_ids(&store), vec!["current"]);
}

#[test]
fn test_reset_filters_follows_clock_and_is_idempotent() {
    let harness = Harness::new("2016-09-06T12:00:00Z");
    let mut store = open(&harness, &seeded_storage());

    harness.clock.set(at("2016-10-05T12:00:00Z"));
    store.reset_filters();
    assert_eq!(visible_ids(&store), vec!["upcoming"]);

    store.reset_filters();
    assert_eq!(visible_ids(&store), vec!["upcoming"]);
}

#[test]
fn test_validity_bounds_are_inclusive() {
    let harness = Harness::new("2016-10-01T00:00:00Z");
    let mut store = open(&harness, &seeded_storage());
    assert_eq!(visible_ids(&store), vec!["upcoming"]);

    harness.clock.set(at("2016-09-30T00:00:00Z"));
    store.reset_filters();
    assert_eq!(visible_ids(&store), vec!["current"]);
}

#[test]
fn test_merge_writes_through() {
    let harness = Harness::new("2016-09-06T12:00:00Z");
    let storage = MemoryStorage::new();
    let mut store = open(&harness, &storage);

    let report = store
        .merge(vec![
            announcement("new", "2016-09-05T00:00:00Z", "2016-09-07T00:00:00Z"),
            announcement("later", "2016-09-10T00:00:00Z", "2016-09-12T00:00:00Z"),
        ])
        .unwrap();

    assert_eq!(report.saved, 2);
    assert!(storage.contains("new"));
    assert!(storage.contains("later"));
    assert_eq!(visible_ids(&store), vec!["new"]);
}

#[test]
fn test_remove_writes_through() {
    let harness = Harness::new("2016-09-06T12:00:00Z");
    let storage = seeded_storage();
    let mut store = open(&harness, &storage);

    assert!(store.remove("current").unwrap());
    assert!(!storage.contains("current"));
    assert!(visible_ids(&store).is_empty());

    assert!(!store.remove("missing").unwrap());
}

#[test]
fn test_merge_reports_storage_failure() {
    let harness = Harness::new("2016-09-06T12:00:00Z");
    let mut store =
        AnnouncementStore::open(Box::new(BrokenStorage), harness.fetcher.clone(), harness.clock.clone()).unwrap();

    let result = store.merge(vec![announcement("new", "2016-09-05T00:00:00Z", "2016-09-07T00:00:00Z")]);

    assert!(matches!(result, Err(StoreError::Storage(StorageError::Io(_)))));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_fetch_announcements() {
    let harness = Harness::new("2016-09-06T12:00:00Z");
    let store = open(&harness, &MemoryStorage::new());

    assert_eq!(store.fetch_announcements(), FetchOutcome::Requested);

    harness.fetcher.fail_with(FetchError::Failed("HTTP 503".to_string()));
    assert_eq!(
        store.fetch_announcements(),
        FetchOutcome::Failed(FetchError::Failed("HTTP 503".to_string()))
    );
    assert_eq!(
        harness
            .fetcher
            .announcement_requests
            .load(std::sync::atomic::Ordering::SeqCst),
        2
    );
}
