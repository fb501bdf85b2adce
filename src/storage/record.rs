//! Record envelope and the collection trait shared by every entity.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The six persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Users,
    Activities,
    Assessments,
    ChallengeProgress,
    Achievements,
    Redemptions,
}

impl EntityKind {
    /// Every collection, in sync order.
    ///
    /// The user aggregate goes first so remote readers never see an
    /// activity for an unknown owner.
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Users,
        EntityKind::Activities,
        EntityKind::Assessments,
        EntityKind::ChallengeProgress,
        EntityKind::Achievements,
        EntityKind::Redemptions,
    ];

    /// Local SQLite table backing this collection.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Users => "users",
            EntityKind::Activities => "activities",
            EntityKind::Assessments => "assessments",
            EntityKind::ChallengeProgress => "challenge_progress",
            EntityKind::Achievements => "achievements",
            EntityKind::Redemptions => "redemptions",
        }
    }

    /// Collection name on the remote store.
    pub fn remote_collection(&self) -> &'static str {
        match self {
            EntityKind::Users => "users",
            EntityKind::Activities => "activities",
            EntityKind::Assessments => "assessments",
            EntityKind::ChallengeProgress => "challengeProgress",
            EntityKind::Achievements => "achievements",
            EntityKind::Redemptions => "redemptions",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// Fields every record carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Globally unique record id
    pub id: Uuid,
    /// Owning user
    pub owner_id: Uuid,
    /// Whether the remote store has confirmed this version
    #[serde(default)]
    pub synced: bool,
    /// When the remote store last confirmed it
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
}

impl Envelope {
    /// Fresh, unsynced envelope with a random id.
    pub fn new(owner_id: Uuid) -> Self {
        Self::with_id(Uuid::new_v4(), owner_id)
    }

    /// Fresh, unsynced envelope with a caller-chosen id.
    pub fn with_id(id: Uuid, owner_id: Uuid) -> Self {
        Self {
            id,
            owner_id,
            synced: false,
            synced_at: None,
        }
    }

    /// Flag a local modification that the remote has not seen yet.
    pub fn mark_dirty(&mut self) {
        self.synced = false;
    }
}

/// A value stored in one of the local collections.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection this record lives in.
    const KIND: EntityKind;

    fn envelope(&self) -> &Envelope;

    fn envelope_mut(&mut self) -> &mut Envelope;

    /// Instant used for the (owner, timestamp) index and oldest-first order.
    fn timestamp(&self) -> DateTime<Utc>;

    fn id(&self) -> Uuid {
        self.envelope().id
    }

    fn owner_id(&self) -> Uuid {
        self.envelope().owner_id
    }

    /// Document sent to the remote store.
    ///
    /// Sync bookkeeping is device-only and is stripped here.
    fn remote_document(&self) -> Result<serde_json::Value, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Some(map) = value.as_object_mut() {
            map.remove("synced");
            map.remove("syncedAt");
        }
        Ok(value)
    }
}

/// Secondary index lookups supported by every collection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndexQuery {
    /// All records of one owner.
    Owner(Uuid),
    /// Records of one owner with `from <= timestamp < to`.
    OwnerTimeRange {
        owner: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    /// Records by synced flag.
    Synced(bool),
}
