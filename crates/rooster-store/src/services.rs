//! Collaborators the stores call into but do not own.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;

use crate::calendar::WeekRange;
use crate::error::FetchError;

/// Remote source of timetable data.
///
/// Both calls only trigger a refresh. Results arrive later through the
/// stores' `merge` methods.
pub trait FetchService: Send + Sync {
    fn get_announcement_data(&self) -> Result<(), FetchError>;

    /// Fetch appointments intersecting `range`.
    fn get_appointments(&self, range: &WeekRange) -> Result<(), FetchError>;
}

/// Identity of the signed-in user.
pub trait UserProvider: Send + Sync {
    fn current_user(&self) -> String;
}

/// The calendar view showing appointments.
pub trait CalendarView: Send + Sync {
    /// Day the user is looking at.
    fn current_day(&self) -> NaiveDate;

    /// Ask the view to re-render its events.
    fn refresh_events(&self);
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Result of asking the fetch service for data.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Local data was sufficient.
    NotNeeded,
    Requested,
    /// The request failed; local data is left as is.
    Failed(FetchError),
}

impl FetchOutcome {
    pub fn was_requested(&self) -> bool {
        matches!(self, Self::Requested)
    }
}

/// Everything the appointment store needs from its surroundings.
#[derive(Clone)]
pub struct StoreServices {
    pub fetcher: Arc<dyn FetchService>,
    pub users: Arc<dyn UserProvider>,
    pub view: Arc<dyn CalendarView>,
    pub clock: Arc<dyn Clock>,
}

impl StoreServices {
    pub fn new(
        fetcher: Arc<dyn FetchService>,
        users: Arc<dyn UserProvider>,
        view: Arc<dyn CalendarView>,
    ) -> Self {
        Self {
            fetcher,
            users,
            view,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
