//! Rewards bought with points.

pub mod service;
pub mod types;

pub use service::{RewardError, RewardService};
pub use types::{redemption_code, Redemption, RedemptionStatus, Reward, DEFAULT_VALIDITY_DAYS};
