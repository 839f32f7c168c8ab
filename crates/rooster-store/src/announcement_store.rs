//! School announcements, persisted on every change.

use std::sync::Arc;

use tracing::instrument;

use crate::collection::{BatchEnd, Collection, ListenerId, StoreEvent, SyncReport};
use crate::error::StoreResult;
use crate::services::{Clock, FetchOutcome, FetchService};
use crate::storage::RecordStorage;
use crate::types::Announcement;

const VALIDITY_FILTER: &str = "valid";

pub struct AnnouncementStore {
    records: Collection<Announcement>,
    storage: Box<dyn RecordStorage<Announcement>>,
    fetcher: Arc<dyn FetchService>,
    clock: Arc<dyn Clock>,
}

impl AnnouncementStore {
    /// Load stored announcements and show the ones valid now.
    pub fn open(
        storage: Box<dyn RecordStorage<Announcement>>,
        fetcher: Arc<dyn FetchService>,
        clock: Arc<dyn Clock>,
    ) -> StoreResult<Self> {
        let mut records = Collection::new();
        records.load(storage.load_all()?);

        let mut store = Self {
            records,
            storage,
            fetcher,
            clock,
        };
        store.reset_filters();

        tracing::info!(count = store.records.len(), "Announcement store opened");
        Ok(store)
    }

    /// Ask the fetch service for fresh announcements.
    #[instrument(skip(self), level = "debug")]
    pub fn fetch_announcements(&self) -> FetchOutcome {
        match self.fetcher.get_announcement_data() {
            Ok(()) => FetchOutcome::Requested,
            Err(e) => {
                tracing::warn!("Announcement fetch failed: {}", e);
                FetchOutcome::Failed(e)
            }
        }
    }

    /// Show exactly the announcements valid at the current time.
    pub fn reset_filters(&mut self) {
        self.records.clear_filters();
        let now = self.clock.now();
        self.records
            .add_filter(VALIDITY_FILTER, move |a: &Announcement| a.valid_at(now));
    }

    /// Upsert fetched announcements and persist them.
    pub fn merge(&mut self, announcements: Vec<Announcement>) -> StoreResult<SyncReport> {
        {
            let mut batch = self.records.begin_batch(BatchEnd::Flush);
            for announcement in announcements {
                batch.insert_or_replace(announcement);
            }
        }
        self.write_through()
    }

    /// Remove an announcement and persist the removal. Returns whether it
    /// existed.
    pub fn remove(&mut self, id: &str) -> StoreResult<bool> {
        if self.records.remove(id).is_none() {
            return Ok(false);
        }
        self.write_through()?;
        Ok(true)
    }

    fn write_through(&mut self) -> StoreResult<SyncReport> {
        let report = self.records.sync(self.storage.as_ref())?;
        tracing::debug!(saved = report.saved, deleted = report.deleted, "Announcements written");
        Ok(report)
    }

    pub fn visible(&self) -> impl Iterator<Item = &Announcement> + '_ {
        self.records.visible()
    }

    pub fn get(&self, id: &str) -> Option<&Announcement> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn subscribe(&mut self, listener: impl Fn(&StoreEvent) + Send + Sync + 'static) -> ListenerId {
        self.records.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.records.unsubscribe(id)
    }
}
