//! TinySteps - Childcare Activity Tracker
//!
//! Local-first core of a childcare-activity tracking app. Caregivers log
//! activities, earn points under per-day caps, level up, take EQ
//! assessments and redeem rewards, all against a local SQLite store that
//! works offline. A background sync engine pushes local records to a remote
//! store whenever connectivity allows.

pub mod account;
pub mod activities;
pub mod assessments;
pub mod clock;
pub mod points;
pub mod progress;
pub mod rewards;
pub mod services;
pub mod storage;
pub mod sync;

// Re-export commonly used types
pub use account::{AccountService, UserAggregate};
pub use activities::{ActivityRecord, ActivityService, NewActivity};
pub use clock::{Clock, DayZone, ManualClock, SystemClock};
pub use points::{ActivityCatalog, PointsEngine};
pub use rewards::{Redemption, Reward, RewardService};
pub use services::AppServices;
pub use storage::{AppConfig, LocalStore};
pub use sync::{SyncEngine, SyncHandle};
