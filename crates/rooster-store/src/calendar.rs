//! Calendar arithmetic in the timetable's local timezone.

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::error::{StoreError, StoreResult};

/// Instant of local midnight at the start of `date`.
pub fn local_midnight(date: NaiveDate, tz: Tz) -> StoreResult<DateTime<Utc>> {
    to_utc(date.and_time(NaiveTime::MIN), tz)
}

fn to_utc(local: NaiveDateTime, tz: Tz) -> StoreResult<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or(StoreError::InvalidLocalTime(local))
}

fn add_days(date: NaiveDate, days: i64) -> StoreResult<NaiveDate> {
    let shifted = if days >= 0 {
        date.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    shifted.ok_or(StoreError::DateOutOfRange(date))
}

/// The data-loading unit: Monday 00:00 up to Saturday 00:00, local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekRange {
    pub monday: NaiveDate,
    pub saturday: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl WeekRange {
    pub fn start_millis(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn end_millis(&self) -> i64 {
        self.end.timestamp_millis()
    }
}

/// Week containing `target`. Sunday counts as the day before the next
/// week's Monday, not as the end of the current week.
pub fn week_containing(target: NaiveDate, tz: Tz) -> StoreResult<WeekRange> {
    let offset = 1 - i64::from(target.weekday().num_days_from_sunday());
    let monday = add_days(target, offset)?;
    let saturday = add_days(monday, 5)?;

    Ok(WeekRange {
        monday,
        saturday,
        start: local_midnight(monday, tz)?,
        end: local_midnight(saturday, tz)?,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStep {
    Forward,
    Backward,
}

impl WindowStep {
    fn days(self) -> i64 {
        match self {
            WindowStep::Forward => 1,
            WindowStep::Backward => -1,
        }
    }
}

/// One local calendar day, used for day-by-day navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub day: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn starting(day: NaiveDate, tz: Tz) -> StoreResult<Self> {
        Ok(Self {
            day,
            start: local_midnight(day, tz)?,
            end: local_midnight(add_days(day, 1)?, tz)?,
        })
    }

    /// Move one day, jumping over the weekend when leaving Friday forwards
    /// or Monday backwards.
    pub fn step(&self, step: WindowStep, tz: Tz) -> StoreResult<Self> {
        let mut days = step.days();
        match (self.day.weekday(), step) {
            (Weekday::Fri, WindowStep::Forward) | (Weekday::Mon, WindowStep::Backward) => days *= 3,
            _ => {}
        }
        Self::starting(add_days(self.day, days)?, tz)
    }

    /// Whether `instant` lies strictly between the window's bounds.
    pub fn contains_start(&self, instant: DateTime<Utc>) -> bool {
        self.start < instant && instant < self.end
    }
}

/// Records ending before this instant are pruned: `days` local calendar days
/// before the earlier of `current_start` and `now`.
///
/// A wall-clock time that falls in a DST gap moves forward by the length of
/// the gap.
pub fn prune_cutoff(
    current_start: DateTime<Utc>,
    now: DateTime<Utc>,
    days: u32,
    tz: Tz,
) -> StoreResult<DateTime<Utc>> {
    let local = current_start.min(now).with_timezone(&tz).naive_local();
    let shifted = local
        .checked_sub_days(Days::new(u64::from(days)))
        .ok_or(StoreError::DateOutOfRange(local.date()))?;
    to_utc(shifted, tz).or_else(|_| skip_gap(shifted, tz))
}

/// Resolve a local time inside a DST gap by pushing it past the transition.
fn skip_gap(local: NaiveDateTime, tz: Tz) -> StoreResult<DateTime<Utc>> {
    // Offsets before and after the gap, read a day away from it.
    let offset_at = |time: NaiveDateTime| {
        tz.from_local_datetime(&time)
            .earliest()
            .map(|dt| dt.offset().fix().local_minus_utc())
    };
    let before = offset_at(local - Duration::days(1));
    let after = offset_at(local + Duration::days(1));
    match (before, after) {
        (Some(before), Some(after)) if after > before => {
            to_utc(local + Duration::seconds(i64::from(after - before)), tz)
        }
        _ => Err(StoreError::InvalidLocalTime(local)),
    }
}
