//! Unit tests for calendar-day windows.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use tinysteps::clock::{calendar_day, day_window, day_window_at, DayZone};

fn instant(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

#[test]
fn test_consecutive_windows_touch() {
    let zone = DayZone::from_offset_minutes(330).unwrap();
    let day = calendar_day(instant(1_717_243_200), zone);
    let (_, end) = day_window(day, zone);
    let (next_start, _) = day_window(day.succ_opt().unwrap(), zone);
    assert_eq!(end, next_start);
}

proptest! {
    #[test]
    fn prop_window_contains_instant(
        secs in 0i64..4_000_000_000,
        offset in -720i32..=840
    ) {
        let zone = DayZone::from_offset_minutes(offset).unwrap();
        let at = instant(secs);
        let (start, end) = day_window_at(at, zone);

        prop_assert!(start <= at && at < end);
        prop_assert_eq!(end - start, Duration::hours(24));
        prop_assert_eq!(calendar_day(start, zone), calendar_day(at, zone));
        prop_assert!(calendar_day(end, zone) > calendar_day(at, zone));
    }
}
