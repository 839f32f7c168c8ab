//! Fake collaborators shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rooster_store::{
    Announcement, Appointment, CalendarView, Clock, FetchError, FetchService, StoreServices, UserProvider, WeekRange,
};

pub const ME: &str = "~me";

/// Records every request; fails with `failure` when set.
#[derive(Default)]
pub struct RecordingFetcher {
    pub weeks: Mutex<Vec<WeekRange>>,
    pub announcement_requests: AtomicUsize,
    pub failure: Mutex<Option<FetchError>>,
}

impl RecordingFetcher {
    pub fn requested_mondays(&self) -> Vec<NaiveDate> {
        self.weeks.lock().iter().map(|w| w.monday).collect()
    }

    pub fn fail_with(&self, error: FetchError) {
        *self.failure.lock() = Some(error);
    }

    fn result(&self) -> Result<(), FetchError> {
        match self.failure.lock().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl FetchService for RecordingFetcher {
    fn get_announcement_data(&self) -> Result<(), FetchError> {
        self.announcement_requests.fetch_add(1, Ordering::SeqCst);
        self.result()
    }

    fn get_appointments(&self, range: &WeekRange) -> Result<(), FetchError> {
        self.weeks.lock().push(*range);
        self.result()
    }
}

pub struct SwitchableUser(Mutex<String>);

impl SwitchableUser {
    pub fn set(&self, user: &str) {
        *self.0.lock() = user.to_string();
    }
}

impl UserProvider for SwitchableUser {
    fn current_user(&self) -> String {
        self.0.lock().clone()
    }
}

pub struct FakeView {
    pub day: Mutex<NaiveDate>,
    pub refreshes: AtomicUsize,
}

impl FakeView {
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

impl CalendarView for FakeView {
    fn current_day(&self) -> NaiveDate {
        *self.day.lock()
    }

    fn refresh_events(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.lock() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}

pub struct Harness {
    pub fetcher: Arc<RecordingFetcher>,
    pub users: Arc<SwitchableUser>,
    pub view: Arc<FakeView>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub fn new(now: &str) -> Self {
        Self {
            fetcher: Arc::new(RecordingFetcher::default()),
            users: Arc::new(SwitchableUser(Mutex::new(ME.to_string()))),
            view: Arc::new(FakeView {
                day: Mutex::new(date(2016, 9, 7)),
                refreshes: AtomicUsize::new(0),
            }),
            clock: Arc::new(FixedClock(Mutex::new(at(now)))),
        }
    }

    pub fn services(&self) -> StoreServices {
        StoreServices::new(self.fetcher.clone(), self.users.clone(), self.view.clone())
            .with_clock(self.clock.clone())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

pub fn appointment(id: &str, user: &str, start: &str, end: &str) -> Appointment {
    Appointment::new(id, user, at(start), at(end)).unwrap()
}

pub fn announcement_fixture(id: &str) -> Announcement {
    Announcement {
        id: id.to_string(),
        start: at("2016-09-01T00:00:00Z"),
        end: at("2016-09-30T00:00:00Z"),
        title: "Rooster change".to_string(),
        text: "The fourth hour starts ten minutes later.".to_string(),
    }
}
