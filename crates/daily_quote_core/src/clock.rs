//! Calendar-day keys and injectable clocks.
//!
//! # Responsibility
//! - Normalize "now" into a `DateKey` under one fixed timezone.
//! - Let tests substitute the current instant.
//!
//! # Invariants
//! - The timezone is chosen once per engine (`EngineConfig::timezone`) and
//!   never derived per request.
//! - `DateKey` storage encoding is ISO `YYYY-MM-DD`, which sorts
//!   chronologically as text.

use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Calendar day (midnight-aligned) used as the unit of one selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Converts a UTC instant to the calendar day observed in `tz`.
    pub fn from_instant(instant: DateTime<Utc>, tz: Tz) -> Self {
        Self(instant.with_timezone(&tz).date_naive())
    }

    /// Builds a key from year/month/day, `None` when the date is invalid.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }

    /// Returns the day `days` before this one, saturating at the earliest
    /// representable date.
    pub fn days_back(self, days: u32) -> Self {
        Self(
            self.0
                .checked_sub_days(Days::new(u64::from(days)))
                .unwrap_or(NaiveDate::MIN),
        )
    }

    /// Returns the day `days` after this one, saturating at the latest
    /// representable date.
    ///
    /// Nothing in the engine looks forward in time. This exists for callers
    /// and tests that replay consecutive days through
    /// [`crate::SelectionPolicy::select_for`] or [`FixedClock`].
    pub fn days_ahead(self, days: u32) -> Self {
        Self(
            self.0
                .checked_add_days(Days::new(u64::from(days)))
                .unwrap_or(NaiveDate::MAX),
        )
    }

    /// Storage/wire encoding (`YYYY-MM-DD`).
    pub fn to_db_string(self) -> String {
        self.0.format(DATE_KEY_FORMAT).to_string()
    }
}

impl Display for DateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(DATE_KEY_FORMAT))
    }
}

impl FromStr for DateKey {
    type Err = chrono::ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(value.trim(), DATE_KEY_FORMAT).map(Self)
    }
}

impl From<NaiveDate> for DateKey {
    fn from(value: NaiveDate) -> Self {
        Self(value)
    }
}

/// Abstraction over "current time" so day boundaries are testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Today's key under `tz`.
    fn today(&self, tz: Tz) -> DateKey {
        DateKey::from_instant(self.now(), tz)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// Clock reading noon UTC on `day`.
    pub fn at_noon_utc(day: DateKey) -> Self {
        let noon = day
            .date()
            .and_hms_opt(12, 0, 0)
            .unwrap_or_default()
            .and_utc();
        Self { now: noon }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
