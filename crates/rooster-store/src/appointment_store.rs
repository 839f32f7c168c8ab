//! The signed-in user's appointments, loaded from local storage and
//! completed week by week from the fetch service.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use rooster_core::ScheduleConfig;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::calendar::{prune_cutoff, week_containing, DayWindow, WindowStep};
use crate::collection::{BatchEnd, Collection, ListenerId, StoreEvent, SyncReport};
use crate::collision::collision_groups;
use crate::deferred::{defer, DeferredTask};
use crate::error::StoreResult;
use crate::services::{FetchOutcome, StoreServices};
use crate::storage::RecordStorage;
use crate::types::Appointment;

/// Appointment store shared with deferred tasks.
pub type SharedAppointmentStore = Arc<Mutex<AppointmentStore>>;

const USER_FILTER: &str = "user";
const WINDOW_FILTER: &str = "window";

#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    pub timezone: Tz,
    pub prune_after_days: u32,
    pub deferred_delay: Duration,
    pub initial_window: NaiveDate,
}

impl ScheduleSettings {
    pub fn from_config(config: &ScheduleConfig) -> StoreResult<Self> {
        Ok(Self {
            timezone: config.timezone()?,
            prune_after_days: config.prune_after_days,
            deferred_delay: Duration::from_millis(config.deferred_delay_ms),
            initial_window: config.initial_window,
        })
    }
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        let config = ScheduleConfig::default();
        Self {
            timezone: chrono_tz::Europe::Amsterdam,
            prune_after_days: config.prune_after_days,
            deferred_delay: Duration::from_millis(config.deferred_delay_ms),
            initial_window: config.initial_window,
        }
    }
}

/// Handles to the jobs queued by [`AppointmentStore::queue_delayed_events`].
#[derive(Debug)]
pub struct DelayedEvents {
    pub prune: DeferredTask<StoreResult<usize>>,
    pub sync: DeferredTask<StoreResult<SyncReport>>,
}

impl DelayedEvents {
    pub fn cancel(&self) {
        self.prune.cancel();
        self.sync.cancel();
    }
}

pub struct AppointmentStore {
    records: Collection<Appointment>,
    storage: Box<dyn RecordStorage<Appointment>>,
    services: StoreServices,
    settings: ScheduleSettings,
    /// Monday 00:00 of the most recently ensured week.
    current_start_date: DateTime<Utc>,
    window: DayWindow,
    deferred: CancellationToken,
}

impl AppointmentStore {
    /// Load all stored appointments and show the current user's.
    pub fn open(
        storage: Box<dyn RecordStorage<Appointment>>,
        services: StoreServices,
        settings: ScheduleSettings,
    ) -> StoreResult<Self> {
        let window = DayWindow::starting(settings.initial_window, settings.timezone)?;
        let mut records = Collection::new();
        records.load(storage.load_all()?);

        let mut store = Self {
            records,
            storage,
            current_start_date: services.clock.now(),
            services,
            settings,
            window,
            deferred: CancellationToken::new(),
        };
        store.reset_filters();

        tracing::info!(count = store.records.len(), "Appointment store opened");
        Ok(store)
    }

    /// Wrap the store for use with [`Self::queue_delayed_events`].
    pub fn into_shared(self) -> SharedAppointmentStore {
        Arc::new(Mutex::new(self))
    }

    /// Snapshot of the current user's appointments.
    pub fn get_as_array(&mut self) -> Vec<Appointment> {
        self.reset_filters();
        self.records.visible().cloned().collect()
    }

    /// Stamp every appointment with the ids of its collision group.
    ///
    /// Appointments are grouped per owning user. Returns the number of groups
    /// with more than one member. Observers get a single refresh.
    #[instrument(skip(self), level = "debug")]
    pub fn detect_collisions(&mut self) -> usize {
        let mut batch = self.records.begin_batch(BatchEnd::Refresh);
        batch.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then(a.end.cmp(&b.end))
                .then_with(|| a.id.cmp(&b.id))
        });

        let (colliding, stamps) = {
            let mut by_user: HashMap<&str, Vec<&Appointment>> = HashMap::new();
            for appointment in batch.iter() {
                by_user.entry(appointment.user.as_str()).or_default().push(appointment);
            }

            let mut colliding = 0;
            let mut stamps: Vec<(String, String)> = Vec::new();
            for appointments in by_user.values() {
                let spans: Vec<_> = appointments.iter().map(|a| (a.start, a.end)).collect();
                for group in collision_groups(&spans) {
                    let members = &appointments[group];
                    if members.len() > 1 {
                        colliding += 1;
                    }
                    let joined = members
                        .iter()
                        .map(|a| a.id.as_str())
                        .collect::<Vec<_>>()
                        .join(",");
                    for member in members {
                        if member.colliding_ids != joined {
                            stamps.push((member.id.clone(), joined.clone()));
                        }
                    }
                }
            }
            (colliding, stamps)
        };

        tracing::debug!(groups = colliding, stamped = stamps.len(), "Collisions detected");
        for (id, joined) in stamps {
            batch.update(&id, |a| a.colliding_ids = joined);
        }
        colliding
    }

    /// Number of the current user's appointments lying entirely inside
    /// `[start, end]`.
    pub fn get_appointment_count_in_interval(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> usize {
        let user = self.services.users.current_user();
        self.records
            .iter()
            .filter(|a| a.user == user && a.is_within(start, end))
            .count()
    }

    /// Make sure the week shown by the calendar view is loaded, then ask the
    /// view to re-render.
    pub fn refresh_current_week(&mut self, force_refresh: bool) -> StoreResult<FetchOutcome> {
        let day = self.services.view.current_day();
        let outcome = self.get_week_if_needed(day, force_refresh)?;
        self.services.view.refresh_events();
        Ok(outcome)
    }

    /// Request the week containing `target` unless some of its appointments
    /// are already stored.
    #[instrument(skip(self), level = "debug")]
    pub fn get_week_if_needed(&mut self, target: NaiveDate, force_refresh: bool) -> StoreResult<FetchOutcome> {
        let week = week_containing(target, self.settings.timezone)?;
        self.current_start_date = week.start;

        let cached = self.get_appointment_count_in_interval(week.start, week.end);
        if cached > 0 && !force_refresh {
            tracing::debug!(monday = %week.monday, cached, "Week already loaded");
            return Ok(FetchOutcome::NotNeeded);
        }

        tracing::info!(monday = %week.monday, force_refresh, "Requesting appointments");
        match self.services.fetcher.get_appointments(&week) {
            Ok(()) => Ok(FetchOutcome::Requested),
            Err(e) => {
                tracing::warn!(monday = %week.monday, "Appointment fetch failed: {}", e);
                Ok(FetchOutcome::Failed(e))
            }
        }
    }

    /// Schedule a prune pass and a sync pass after `delay` (the configured
    /// delay when `None`). Both are cancelled if the store is dropped first.
    ///
    /// # Errors
    /// Returns `StoreError::NoRuntime` outside a tokio runtime.
    pub fn queue_delayed_events(
        store: &SharedAppointmentStore,
        delay: Option<Duration>,
    ) -> StoreResult<DelayedEvents> {
        let (token, delay) = {
            let guard = store.lock();
            (guard.deferred.clone(), delay.unwrap_or(guard.settings.deferred_delay))
        };

        let weak = Arc::downgrade(store);
        let prune = defer(&token, delay, "prune_local_storage", {
            let weak = weak.clone();
            move || {
                let store = weak.upgrade()?;
                let result = store.lock().prune_local_storage();
                if let Err(e) = &result {
                    tracing::warn!("Deferred prune failed: {}", e);
                }
                Some(result)
            }
        })?;

        let sync = defer(&token, delay, "sync", move || {
            let store = weak.upgrade()?;
            let result = store.lock().sync();
            if let Err(e) = &result {
                tracing::warn!("Deferred sync failed: {}", e);
            }
            Some(result)
        })?;

        Ok(DelayedEvents { prune, sync })
    }

    /// Drop appointments (of every user) that ended before the prune cutoff.
    /// Returns how many were removed.
    pub fn prune_local_storage(&mut self) -> StoreResult<usize> {
        let cutoff = prune_cutoff(
            self.current_start_date,
            self.services.clock.now(),
            self.settings.prune_after_days,
            self.settings.timezone,
        )?;

        let mut batch = self.records.begin_batch(BatchEnd::Flush);
        let removed = batch.retain(|a| a.end >= cutoff);
        drop(batch);

        if !removed.is_empty() {
            tracing::info!(removed = removed.len(), %cutoff, "Pruned old appointments");
        }
        Ok(removed.len())
    }

    /// Persist pending changes.
    pub fn sync(&mut self) -> StoreResult<SyncReport> {
        let report = self.records.sync(self.storage.as_ref())?;
        if report.saved > 0 || report.deleted > 0 {
            tracing::info!(saved = report.saved, deleted = report.deleted, "Appointments synced");
        }
        Ok(report)
    }

    /// Show only the current user's appointments.
    pub fn reset_filters(&mut self) {
        self.records.clear_filters();
        let user = self.services.users.current_user();
        self.records.add_filter(USER_FILTER, move |a: &Appointment| a.user == user);
    }

    /// Switch to the user the provider now reports and reload their week.
    #[instrument(skip(self), level = "info")]
    pub fn change_user(&mut self, user: &str) -> StoreResult<FetchOutcome> {
        self.reset_filters();
        self.refresh_current_week(true)
    }

    /// Move the day window and show the appointments starting inside it.
    #[instrument(skip(self), level = "debug")]
    pub fn set_window(&mut self, step: WindowStep) -> StoreResult<FetchOutcome> {
        let window = self.window.step(step, self.settings.timezone)?;
        let outcome = self.get_week_if_needed(window.day, false)?;
        self.window = window;

        self.reset_filters();
        self.records
            .add_filter(WINDOW_FILTER, move |a: &Appointment| window.contains_start(a.start));
        Ok(outcome)
    }

    /// Add or replace appointments delivered by the fetch service.
    ///
    /// Appointments ending before they start are skipped. Returns the number
    /// merged.
    pub fn merge(&mut self, appointments: Vec<Appointment>) -> usize {
        let mut merged = 0;
        let mut batch = self.records.begin_batch(BatchEnd::Flush);
        for appointment in appointments {
            if let Err(e) = appointment.validate() {
                tracing::warn!("Skipping appointment: {}", e);
                continue;
            }
            batch.insert_or_replace(appointment);
            merged += 1;
        }
        tracing::debug!(merged, "Merged appointments");
        merged
    }

    pub fn window(&self) -> DayWindow {
        self.window
    }

    pub fn current_start_date(&self) -> DateTime<Utc> {
        self.current_start_date
    }

    pub fn visible(&self) -> impl Iterator<Item = &Appointment> + '_ {
        self.records.visible()
    }

    pub fn get(&self, id: &str) -> Option<&Appointment> {
        self.records.get(id)
    }

    /// Number of stored appointments, visible or not.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_pending_changes(&self) -> bool {
        self.records.has_pending_changes()
    }

    pub fn subscribe(&mut self, listener: impl Fn(&StoreEvent) + Send + Sync + 'static) -> ListenerId {
        self.records.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.records.unsubscribe(id)
    }

    /// Cancel queued prune and sync passes.
    pub fn cancel_deferred(&mut self) {
        self.deferred.cancel();
        self.deferred = CancellationToken::new();
    }
}

impl Drop for AppointmentStore {
    fn drop(&mut self) {
        self.deferred.cancel();
    }
}
