//! Points and leveling.
//!
//! Table-driven point rules per activity kind:
//! - Rate-capped kinds earn per minute up to a daily cap
//! - Flat-daily kinds earn once per calendar day
//! - Fixed kinds earn a catalog value every time

pub mod catalog;
pub mod engine;

pub use catalog::{ActivityCatalog, ActivityCategory, ActivityDefinition, PointRule};
pub use engine::{
    calculate_points, is_qualifying, level_for_points, Award, DailyLimit, PointsEngine,
    PointsError, POINTS_PER_LEVEL,
};
