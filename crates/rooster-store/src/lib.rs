//! Client-side timetable stores for Rooster.
//!
//! Appointments and announcements are kept in memory, persisted to SQLite and
//! refreshed through a [`FetchService`].

pub mod announcement_store;
pub mod appointment_store;
pub mod calendar;
pub mod collection;
pub mod collision;
pub mod deferred;
pub mod error;
pub mod services;
pub mod storage;
pub mod timetable;
pub mod types;

pub use announcement_store::AnnouncementStore;
pub use appointment_store::{AppointmentStore, DelayedEvents, ScheduleSettings, SharedAppointmentStore};
pub use calendar::{DayWindow, WeekRange, WindowStep};
pub use collection::{BatchEnd, ChangeSet, Collection, ListenerId, StoreEvent, SyncReport};
pub use deferred::DeferredTask;
pub use error::{FetchError, StorageError, StorageResult, StoreError, StoreResult};
pub use services::{CalendarView, Clock, FetchOutcome, FetchService, StoreServices, SystemClock, UserProvider};
pub use storage::{MemoryStorage, RecordStorage, SqliteStorage};
pub use timetable::Timetable;
pub use types::{Announcement, Appointment, Record};
