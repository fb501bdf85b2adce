//! Shared setup for integration tests.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use std::sync::Arc;
use tinysteps::sync::SyncHandle;
use tinysteps::{AppServices, DayZone, LocalStore, ManualClock};
use uuid::Uuid;

pub struct TestApp {
    pub services: AppServices,
    pub clock: ManualClock,
    pub owner: Uuid,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
}

/// Services over an in-memory store, one signed-in owner, UTC days.
pub fn test_app(sync: Option<SyncHandle>) -> TestApp {
    test_app_with_store(LocalStore::open_in_memory().unwrap(), sync)
}

pub fn test_app_with_store(store: LocalStore, sync: Option<SyncHandle>) -> TestApp {
    let clock = ManualClock::new(start_time());
    let zone = DayZone::Fixed(FixedOffset::east_opt(0).unwrap());
    let services = AppServices::new(store, Arc::new(clock.clone()), zone, sync);

    let owner = Uuid::new_v4();
    services.accounts.sign_in(owner, Some("Sam")).unwrap();

    TestApp {
        services,
        clock,
        owner,
    }
}
