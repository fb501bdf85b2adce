//! Emotional-intelligence assessments.
//!
//! Responses are scored on the device; the record carries both the raw
//! answers and the derived scores.

pub mod scoring;
pub mod service;
pub mod types;

pub use scoring::{score, validate, Scores, MAX_RESPONSE, MIN_RESPONSE};
pub use service::AssessmentService;
pub use types::{
    AssessmentRecord, AssessmentResponse, EqCategory, Interpretation, NewAssessment,
};

use crate::storage::StorageError;
use thiserror::Error;

/// Assessment errors.
#[derive(Debug, Error)]
pub enum AssessmentError {
    #[error("Assessment has no responses")]
    NoResponses,

    #[error("Response {value} to {question_id} is outside the 1-5 scale")]
    OutOfRange { question_id: String, value: u8 },

    #[error("Question {0} answered more than once")]
    DuplicateQuestion(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
