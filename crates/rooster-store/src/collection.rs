//! In-memory record collection.
//!
//! Records are indexed by id and kept in an explicit order that callers can
//! re-sort. Keyed filter predicates define the visible view. Mutations emit
//! [`StoreEvent`]s to subscribers, except inside a [`Batch`], which queues
//! them and fires a single notification when the outermost batch ends.
//! Changed and removed ids are tracked until [`Collection::sync`] writes them
//! to a [`RecordStorage`].

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::error::StorageResult;
use crate::storage::RecordStorage;
use crate::types::Record;

/// Ids touched by one notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    /// The filters changed, so the visible view may differ.
    pub refiltered: bool,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty() && !self.refiltered
    }

    fn merge(&mut self, other: ChangeSet) {
        self.added.extend(other.added);
        self.updated.extend(other.updated);
        self.removed.extend(other.removed);
        self.refiltered |= other.refiltered;
    }

    fn normalized(mut self) -> Self {
        for ids in [&mut self.added, &mut self.updated, &mut self.removed] {
            ids.sort();
            ids.dedup();
        }
        // A record added and updated in the same batch is reported once, as added.
        let added = &self.added;
        self.updated.retain(|id| added.binary_search(id).is_err());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Changed(ChangeSet),
    /// The whole view should be re-read (load, sort, forced refresh).
    Refresh,
}

/// How a batch reports its queued changes when it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchEnd {
    /// Discard the queued changes and emit one `StoreEvent::Refresh`.
    Refresh,
    /// Emit one aggregated `StoreEvent::Changed`, if anything changed.
    Flush,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&StoreEvent) + Send + Sync>;
type Predicate<R> = Arc<dyn Fn(&R) -> bool + Send + Sync>;

struct Filter<R> {
    key: String,
    predicate: Predicate<R>,
}

/// Outcome of writing pending changes to storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub saved: usize,
    pub deleted: usize,
}

pub struct Collection<R: Record> {
    records: HashMap<String, R>,
    order: Vec<String>,
    filters: Vec<Filter<R>>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
    suspended: u32,
    pending: ChangeSet,
    refresh_requested: bool,
    dirty: BTreeSet<String>,
    removed: BTreeSet<String>,
}

impl<R: Record> Default for Collection<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> Collection<R> {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            order: Vec::new(),
            filters: Vec::new(),
            listeners: Vec::new(),
            next_listener: 0,
            suspended: 0,
            pending: ChangeSet::default(),
            refresh_requested: false,
            dirty: BTreeSet::new(),
            removed: BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&R> {
        self.records.get(id)
    }

    /// All records in collection order, ignoring filters.
    pub fn iter(&self) -> impl Iterator<Item = &R> + '_ {
        self.order.iter().filter_map(move |id| self.records.get(id))
    }

    /// Records passing every filter, in collection order.
    pub fn visible(&self) -> impl Iterator<Item = &R> + '_ {
        self.iter().filter(move |record| self.matches(record))
    }

    pub fn visible_count(&self) -> usize {
        self.visible().count()
    }

    fn matches(&self, record: &R) -> bool {
        self.filters.iter().all(|f| (f.predicate)(record))
    }

    /// Replace the contents with records read from storage.
    ///
    /// Loaded records are not dirty.
    pub fn load(&mut self, records: Vec<R>) {
        self.records.clear();
        self.order.clear();
        self.dirty.clear();
        self.removed.clear();

        for record in records {
            let id = record.id().to_string();
            if self.records.insert(id.clone(), record).is_none() {
                self.order.push(id);
            }
        }

        tracing::debug!(count = self.records.len(), "Collection loaded");
        self.emit_refresh();
    }

    /// Insert a record or replace the one with the same id.
    ///
    /// Returns true if the record was new.
    pub fn insert_or_replace(&mut self, record: R) -> bool {
        let id = record.id().to_string();
        let is_new = self.records.insert(id.clone(), record).is_none();
        if is_new {
            self.order.push(id.clone());
        }
        self.removed.remove(&id);
        self.dirty.insert(id.clone());

        let mut change = ChangeSet::default();
        if is_new {
            change.added.push(id);
        } else {
            change.updated.push(id);
        }
        self.emit(change);
        is_new
    }

    /// Mutate a record in place. Returns false if the id is unknown.
    pub fn update(&mut self, id: &str, f: impl FnOnce(&mut R)) -> bool {
        let Some(record) = self.records.get_mut(id) else {
            return false;
        };
        f(record);
        self.dirty.insert(id.to_string());
        self.emit(ChangeSet {
            updated: vec![id.to_string()],
            ..ChangeSet::default()
        });
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<R> {
        let record = self.records.remove(id)?;
        self.order.retain(|other| other != id);
        self.dirty.remove(id);
        self.removed.insert(id.to_string());
        self.emit(ChangeSet {
            removed: vec![id.to_string()],
            ..ChangeSet::default()
        });
        Some(record)
    }

    /// Keep only records for which `keep` holds. Returns the removed ids.
    pub fn retain(&mut self, mut keep: impl FnMut(&R) -> bool) -> Vec<String> {
        let doomed: Vec<String> = self
            .iter()
            .filter(|record| !keep(*record))
            .map(|record| record.id().to_string())
            .collect();
        if doomed.is_empty() {
            return doomed;
        }

        for id in &doomed {
            self.records.remove(id);
            self.dirty.remove(id);
            self.removed.insert(id.clone());
        }
        let records = &self.records;
        self.order.retain(|id| records.contains_key(id));

        self.emit(ChangeSet {
            removed: doomed.clone(),
            ..ChangeSet::default()
        });
        doomed
    }

    /// Re-order the collection. Ties keep their previous relative order.
    pub fn sort_by(&mut self, mut compare: impl FnMut(&R, &R) -> Ordering) {
        let records = &self.records;
        self.order.sort_by(|a, b| match (records.get(a), records.get(b)) {
            (Some(x), Some(y)) => compare(x, y),
            _ => Ordering::Equal,
        });
        self.emit_refresh();
    }

    /// Add a filter, replacing any filter registered under the same key.
    pub fn add_filter(&mut self, key: impl Into<String>, predicate: impl Fn(&R) -> bool + Send + Sync + 'static) {
        let key = key.into();
        self.filters.retain(|f| f.key != key);
        self.filters.push(Filter {
            key,
            predicate: Arc::new(predicate),
        });
        self.emit_refiltered();
    }

    pub fn clear_filters(&mut self) {
        if self.filters.is_empty() {
            return;
        }
        self.filters.clear();
        self.emit_refiltered();
    }

    pub fn subscribe(&mut self, listener: impl Fn(&StoreEvent) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(other, _)| *other != id);
        self.listeners.len() != before
    }

    /// Suspend notifications until the returned guard is dropped.
    pub fn begin_batch(&mut self, end: BatchEnd) -> Batch<'_, R> {
        self.suspended += 1;
        Batch {
            collection: self,
            end,
        }
    }

    /// Whether there are changes not yet written to storage.
    pub fn has_pending_changes(&self) -> bool {
        !self.dirty.is_empty() || !self.removed.is_empty()
    }

    /// Write dirty records and deletions to `storage`.
    ///
    /// Pending changes that fail to persist stay pending.
    pub fn sync(&mut self, storage: &dyn RecordStorage<R>) -> StorageResult<SyncReport> {
        let mut report = SyncReport::default();

        let to_save: Vec<R> = self
            .dirty
            .iter()
            .filter_map(|id| self.records.get(id))
            .cloned()
            .collect();
        if !to_save.is_empty() {
            storage.save(&to_save)?;
            report.saved = to_save.len();
        }
        self.dirty.clear();

        let to_delete: Vec<String> = self.removed.iter().cloned().collect();
        if !to_delete.is_empty() {
            storage.delete(&to_delete)?;
            report.deleted = to_delete.len();
        }
        self.removed.clear();

        Ok(report)
    }

    fn emit(&mut self, change: ChangeSet) {
        if self.suspended > 0 {
            self.pending.merge(change);
        } else {
            self.notify(&StoreEvent::Changed(change));
        }
    }

    fn emit_refiltered(&mut self) {
        self.emit(ChangeSet {
            refiltered: true,
            ..ChangeSet::default()
        });
    }

    fn emit_refresh(&mut self) {
        if self.suspended > 0 {
            self.refresh_requested = true;
        } else {
            self.notify(&StoreEvent::Refresh);
        }
    }

    fn notify(&self, event: &StoreEvent) {
        for (_, listener) in &self.listeners {
            listener(event);
        }
    }

    fn finish_batch(&mut self, end: BatchEnd) {
        self.suspended = self.suspended.saturating_sub(1);
        if end == BatchEnd::Refresh {
            self.refresh_requested = true;
        }
        if self.suspended > 0 {
            return;
        }

        let pending = std::mem::take(&mut self.pending);
        if std::mem::take(&mut self.refresh_requested) {
            self.notify(&StoreEvent::Refresh);
        } else if !pending.is_empty() {
            self.notify(&StoreEvent::Changed(pending.normalized()));
        }
    }
}

/// Scope during which notifications are queued. See [`Collection::begin_batch`].
pub struct Batch<'a, R: Record> {
    collection: &'a mut Collection<R>,
    end: BatchEnd,
}

impl<R: Record> Deref for Batch<'_, R> {
    type Target = Collection<R>;

    fn deref(&self) -> &Self::Target {
        self.collection
    }
}

impl<R: Record> DerefMut for Batch<'_, R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.collection
    }
}

impl<R: Record> Drop for Batch<'_, R> {
    fn drop(&mut self) {
        self.collection.finish_batch(self.end);
    }
}
