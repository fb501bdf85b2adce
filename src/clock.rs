//! Time source and calendar-day boundaries.
//!
//! Daily point caps and streaks are evaluated per local calendar day. The
//! day an instant falls on is a pure function of the instant and a
//! [`DayZone`], so tests can pin both the clock and the zone.

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::sync::{Arc, Mutex};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// Current time in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Jump to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = instant;
        }
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|now| *now).unwrap_or_else(|e| *e.into_inner())
    }
}

/// Time zone used to decide where a calendar day starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayZone {
    /// The device's local time zone, DST included.
    #[default]
    Local,
    /// A fixed offset from UTC.
    Fixed(FixedOffset),
}

impl DayZone {
    /// Build a fixed zone from an offset in minutes east of UTC.
    ///
    /// Returns `None` for offsets outside ±24h.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(DayZone::Fixed)
    }
}

/// Calendar day that `instant` falls on in `zone`.
pub fn calendar_day(instant: DateTime<Utc>, zone: DayZone) -> NaiveDate {
    match zone {
        DayZone::Local => instant.with_timezone(&Local).date_naive(),
        DayZone::Fixed(offset) => instant.with_timezone(&offset).date_naive(),
    }
}

/// Half-open UTC window `[start, end)` covering `day` in `zone`.
///
/// `end` is the next local midnight, which differs from `start + 24h` on
/// days with a DST transition.
pub fn day_window(day: NaiveDate, zone: DayZone) -> (DateTime<Utc>, DateTime<Utc>) {
    let next = day.succ_opt().unwrap_or(day);
    (local_midnight(day, zone), local_midnight(next, zone))
}

/// Window of the calendar day containing `instant`.
pub fn day_window_at(instant: DateTime<Utc>, zone: DayZone) -> (DateTime<Utc>, DateTime<Utc>) {
    day_window(calendar_day(instant, zone), zone)
}

fn local_midnight(day: NaiveDate, zone: DayZone) -> DateTime<Utc> {
    let midnight: NaiveDateTime = day.and_time(chrono::NaiveTime::MIN);
    match zone {
        DayZone::Fixed(offset) => {
            (midnight - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc()
        }
        DayZone::Local => match Local.from_local_datetime(&midnight).earliest() {
            Some(local) => local.with_timezone(&Utc),
            // Midnight skipped by a DST jump; the day starts an hour later.
            None => Local
                .from_local_datetime(&(midnight + Duration::hours(1)))
                .earliest()
                .map(|local| local.with_timezone(&Utc))
                .unwrap_or_else(|| midnight.and_utc()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_calendar_day_respects_offset() {
        let instant = utc("2024-03-10T23:30:00Z");
        assert_eq!(
            calendar_day(instant, DayZone::from_offset_minutes(0).unwrap()),
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
        );
        // 23:30 UTC is already the next morning in UTC+2
        assert_eq!(
            calendar_day(instant, DayZone::from_offset_minutes(120).unwrap()),
            NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()
        );
    }

    #[test]
    fn test_day_window_fixed_offset() {
        let zone = DayZone::from_offset_minutes(-300).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let (start, end) = day_window(day, zone);
        assert_eq!(start, utc("2024-06-01T05:00:00Z"));
        assert_eq!(end, utc("2024-06-02T05:00:00Z"));
    }

    #[test]
    fn test_day_window_contains_instant() {
        let zone = DayZone::from_offset_minutes(60).unwrap();
        let instant = utc("2024-01-15T12:00:00Z");
        let (start, end) = day_window_at(instant, zone);
        assert!(start <= instant && instant < end);
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(utc("2024-01-01T00:00:00Z"));
        clock.advance(Duration::hours(25));
        assert_eq!(clock.now(), utc("2024-01-02T01:00:00Z"));
    }

    #[test]
    fn test_invalid_offset_rejected() {
        assert!(DayZone::from_offset_minutes(25 * 60).is_none());
    }
}
