//! User aggregate type definitions.

use crate::points::level_for_points;
use crate::storage::{EntityKind, Envelope, Record};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-owner points, level and streak totals.
///
/// The record id is the owner id, so there is exactly one per owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAggregate {
    #[serde(flatten)]
    pub envelope: Envelope,
    /// Name shown in the app, if the identity provider supplied one
    pub display_name: Option<String>,
    /// Spendable point balance
    pub points: u32,
    /// Always `points / 100 + 1`
    pub level: u32,
    /// Consecutive calendar days with a qualifying activity
    pub streak: u32,
    /// Activities logged, attempts included
    pub total_activities: u32,
    /// Calendar day of the last qualifying activity
    pub last_activity_day: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserAggregate {
    /// Fresh aggregate for a first sign-in.
    pub fn new(owner_id: Uuid, display_name: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            envelope: Envelope::with_id(owner_id, owner_id),
            display_name,
            points: 0,
            level: level_for_points(0),
            streak: 0,
            total_activities: 0,
            last_activity_day: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the balance and re-derive the level.
    pub fn set_points(&mut self, points: u32) {
        self.points = points;
        self.level = level_for_points(points);
    }

    /// Add to the balance, saturating at `u32::MAX`.
    pub fn add_points(&mut self, points: u32) {
        self.set_points(self.points.saturating_add(points));
    }

    /// Deduct `cost` if the balance covers it.
    pub fn spend_points(&mut self, cost: u32) -> bool {
        match self.points.checked_sub(cost) {
            Some(remaining) => {
                self.set_points(remaining);
                true
            }
            None => false,
        }
    }

    /// Advance the streak for a qualifying activity on `day`.
    ///
    /// Only the first qualifying activity of a day counts. A day directly
    /// after the previous one extends the streak; any gap restarts it at 1.
    pub fn register_qualifying_day(&mut self, day: NaiveDate) {
        match self.last_activity_day {
            Some(last) if last >= day => return,
            Some(last) if last.succ_opt() == Some(day) && self.streak > 0 => self.streak += 1,
            _ => self.streak = 1,
        }
        self.last_activity_day = Some(day);
    }

    /// Streak as seen on `today`: zero once a whole day has been missed.
    pub fn current_streak(&self, today: NaiveDate) -> u32 {
        match self.last_activity_day {
            Some(last) if last == today || last.succ_opt() == Some(today) => self.streak,
            _ => 0,
        }
    }

    /// Freshly created and never synced or credited; a remote copy may
    /// replace it.
    pub fn is_untouched(&self) -> bool {
        !self.envelope.synced
            && self.points == 0
            && self.total_activities == 0
            && self.streak == 0
    }

    /// Stamp a local modification.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.envelope.mark_dirty();
    }
}

impl Record for UserAggregate {
    const KIND: EntityKind = EntityKind::Users;

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
