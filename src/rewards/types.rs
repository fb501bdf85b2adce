//! Reward and redemption type definitions.

use crate::storage::{EntityKind, Envelope, Record};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Characters used in redemption codes. No 0/O, 1/I/L.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Characters in a code, excluding the separator.
const CODE_LENGTH: usize = 8;

/// Default validity of a redemption.
pub const DEFAULT_VALIDITY_DAYS: u32 = 30;

/// A reward offered by a partner. Supplied by the host app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: String,
    pub name: String,
    /// Points deducted on redemption
    pub cost: u32,
    pub validity_days: u32,
}

impl Reward {
    pub fn new(id: &str, name: &str, cost: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            cost,
            validity_days: DEFAULT_VALIDITY_DAYS,
        }
    }

    pub fn valid_for_days(mut self, days: u32) -> Self {
        self.validity_days = days;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionStatus {
    Pending,
    Approved,
    Used,
    Expired,
}

impl RedemptionStatus {
    /// Pending or approved.
    pub fn is_open(&self) -> bool {
        matches!(self, RedemptionStatus::Pending | RedemptionStatus::Approved)
    }
}

impl std::fmt::Display for RedemptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RedemptionStatus::Pending => "pending",
            RedemptionStatus::Approved => "approved",
            RedemptionStatus::Used => "used",
            RedemptionStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// A reward redemption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Redemption {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub reward_id: String,
    pub reward_name: String,
    pub points_spent: u32,
    pub status: RedemptionStatus,
    /// Shown to the partner
    pub code: String,
    pub redeemed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Redemption {
    /// New pending redemption.
    pub fn new(owner_id: Uuid, reward: &Reward, now: DateTime<Utc>) -> Self {
        let envelope = Envelope::new(owner_id);
        let code = redemption_code(envelope.id);
        Self {
            envelope,
            reward_id: reward.id.clone(),
            reward_name: reward.name.clone(),
            points_spent: reward.cost,
            status: RedemptionStatus::Pending,
            code,
            redeemed_at: now,
            expires_at: now + Duration::days(i64::from(reward.validity_days)),
            updated_at: now,
        }
    }

    /// Open and past its expiry.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.status.is_open() && now >= self.expires_at
    }

    pub(crate) fn set_status(&mut self, status: RedemptionStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
        self.envelope.mark_dirty();
    }
}

impl Record for Redemption {
    const KIND: EntityKind = EntityKind::Redemptions;

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.redeemed_at
    }
}

/// Human-friendly code derived from a random id, formatted `XXXX-XXXX`.
pub fn redemption_code(seed: Uuid) -> String {
    let mut value = seed.as_u128();
    let base = CODE_ALPHABET.len() as u128;

    let mut code = String::with_capacity(CODE_LENGTH + 1);
    for i in 0..CODE_LENGTH {
        if i == CODE_LENGTH / 2 {
            code.push('-');
        }
        code.push(CODE_ALPHABET[(value % base) as usize] as char);
        value /= base;
    }
    code
}
