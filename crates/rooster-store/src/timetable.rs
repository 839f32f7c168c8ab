//! Both stores wired to one on-disk database.

use anyhow::{Context, Result};
use rooster_core::Config;

use crate::announcement_store::AnnouncementStore;
use crate::appointment_store::{AppointmentStore, ScheduleSettings, SharedAppointmentStore};
use crate::collection::SyncReport;
use crate::services::StoreServices;
use crate::storage::SqliteStorage;

const APPOINTMENTS: &str = "appointments";
const ANNOUNCEMENTS: &str = "announcements";

pub struct Timetable {
    appointments: SharedAppointmentStore,
    announcements: AnnouncementStore,
}

impl Timetable {
    /// Open the database named in `config` and load both stores from it.
    ///
    /// An invalid configuration is rejected before anything is created on disk.
    pub fn open(config: &Config, services: StoreServices) -> Result<Self> {
        config.ensure_valid()?;
        let settings = ScheduleSettings::from_config(&config.schedule)?;
        let path = config.database_path();
        tracing::info!(path = %path.display(), "Opening timetable database");

        let appointment_storage = SqliteStorage::open(&path, APPOINTMENTS)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let announcement_storage = SqliteStorage::open(&path, ANNOUNCEMENTS)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let announcements = AnnouncementStore::open(
            Box::new(announcement_storage),
            services.fetcher.clone(),
            services.clock.clone(),
        )?;
        let appointments =
            AppointmentStore::open(Box::new(appointment_storage), services, settings)?.into_shared();

        Ok(Self {
            appointments,
            announcements,
        })
    }

    /// Shared handle to the appointment store.
    pub fn appointments(&self) -> SharedAppointmentStore {
        self.appointments.clone()
    }

    pub fn announcements(&self) -> &AnnouncementStore {
        &self.announcements
    }

    pub fn announcements_mut(&mut self) -> &mut AnnouncementStore {
        &mut self.announcements
    }

    /// Cancel queued prune and sync passes and persist what is pending.
    pub fn shutdown(&self) -> Result<SyncReport> {
        let mut store = self.appointments.lock();
        store.cancel_deferred();
        let report = store.sync().context("Final appointment sync failed")?;
        tracing::info!("Timetable shut down");
        Ok(report)
    }
}
