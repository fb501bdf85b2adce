//! Activity record type definitions.

use crate::points::ActivityCategory;
use crate::storage::{EntityKind, Envelope, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A logged childcare activity.
///
/// Immutable once written, apart from sync bookkeeping and the media URL
/// filled in after a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    #[serde(flatten)]
    pub envelope: Envelope,
    /// Catalog kind id
    pub activity_kind: String,
    pub category: ActivityCategory,
    /// Time spent in seconds
    pub duration_seconds: u32,
    /// Points credited, after daily caps
    pub points_awarded: u32,
    /// Whether the minimum duration was met
    pub qualifying: bool,
    /// Free-text note from the caregiver
    pub notes: Option<String>,
    /// Attached photo or clip, metadata only
    pub media: Option<MediaAttachment>,
    pub created_at: DateTime<Utc>,
}

impl ActivityRecord {
    /// Whether this was logged below the minimum duration.
    pub fn is_attempt(&self) -> bool {
        !self.qualifying
    }

    /// Completed whole minutes.
    pub fn minutes(&self) -> u32 {
        self.duration_seconds / 60
    }
}

impl Record for ActivityRecord {
    const KIND: EntityKind = EntityKind::Activities;

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Metadata for media attached to an activity.
///
/// The bytes stay on the device; `url` is set once the media store has them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAttachment {
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub url: Option<String>,
}

/// Media captured alongside a new activity.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Input for [`ActivityService::save_activity`](super::ActivityService::save_activity).
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub owner_id: Uuid,
    pub activity_kind: String,
    pub duration_seconds: u32,
    pub notes: Option<String>,
    pub media: Option<MediaUpload>,
}

impl NewActivity {
    pub fn new(owner_id: Uuid, activity_kind: &str, duration_seconds: u32) -> Self {
        Self {
            owner_id,
            activity_kind: activity_kind.to_string(),
            duration_seconds,
            notes: None,
            media: None,
        }
    }

    /// Convenience for whole-minute durations.
    pub fn minutes(owner_id: Uuid, activity_kind: &str, minutes: u32) -> Self {
        Self::new(owner_id, activity_kind, minutes.saturating_mul(60))
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }

    pub fn with_media(mut self, media: MediaUpload) -> Self {
        self.media = Some(media);
        self
    }
}
