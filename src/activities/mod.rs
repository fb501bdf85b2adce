//! Logged childcare activities.

pub mod service;
pub mod types;

pub use service::{ActivityError, ActivityService};
pub use types::{ActivityRecord, MediaAttachment, MediaUpload, NewActivity};
