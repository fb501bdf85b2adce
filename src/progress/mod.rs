//! Challenges and achievements layered on top of activity awards.

pub mod achievements;
pub mod challenges;

pub use achievements::{
    unlock_id, AchievementCondition, AchievementDefinition, AchievementTracker,
    AchievementUnlock, ACHIEVEMENTS,
};
pub use challenges::{
    ChallengeDefinition, ChallengeMetric, ChallengeProgress, ChallengeTracker,
};

use crate::points::PointsError;
use crate::storage::StorageError;
use thiserror::Error;

/// Challenge and achievement errors.
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("Challenge {0} is already active")]
    AlreadyActive(String),

    #[error(transparent)]
    Points(#[from] PointsError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
