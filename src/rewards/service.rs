//! Point redemption and the redemption lifecycle.

use super::types::{Redemption, RedemptionStatus, Reward};
use crate::account::UserAggregate;
use crate::clock::Clock;
use crate::storage::{EntityKind, IndexQuery, LocalStore, StorageError};
use crate::sync::SyncHandle;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone)]
pub struct RewardService {
    store: LocalStore,
    clock: Arc<dyn Clock>,
    sync: Option<SyncHandle>,
}

impl RewardService {
    pub fn new(store: LocalStore, clock: Arc<dyn Clock>, sync: Option<SyncHandle>) -> Self {
        Self { store, clock, sync }
    }

    /// Spend points on a reward.
    ///
    /// The balance check, the deduction and the pending redemption are one
    /// store transaction; on any error nothing changes.
    pub fn redeem_reward(
        &self,
        owner_id: Uuid,
        reward: &Reward,
    ) -> Result<Redemption, RewardError> {
        let now = self.clock.now();

        let redemption = self.store.transaction(|txn| {
            let mut user: UserAggregate = txn
                .get(owner_id)?
                .ok_or(RewardError::NotSignedIn(owner_id))?;

            if !user.spend_points(reward.cost) {
                return Err(RewardError::InsufficientPoints {
                    available: user.points,
                    required: reward.cost,
                });
            }
            user.touch(now);
            txn.update(&user)?;

            let redemption = Redemption::new(owner_id, reward, now);
            txn.create(&redemption)?;
            Ok(redemption)
        })?;

        tracing::info!(
            "{} redeemed {} for {} points (code {})",
            owner_id,
            reward.id,
            reward.cost,
            redemption.code
        );
        self.notify(true);
        Ok(redemption)
    }

    /// Partner approved a pending redemption.
    pub fn approve(&self, redemption_id: Uuid) -> Result<Redemption, RewardError> {
        self.transition(redemption_id, RedemptionStatus::Approved, |s| {
            s == RedemptionStatus::Pending
        })
    }

    /// Partner honoured an approved redemption.
    pub fn mark_used(&self, redemption_id: Uuid) -> Result<Redemption, RewardError> {
        self.transition(redemption_id, RedemptionStatus::Used, |s| {
            s == RedemptionStatus::Approved
        })
    }

    fn transition(
        &self,
        redemption_id: Uuid,
        to: RedemptionStatus,
        allowed_from: impl Fn(RedemptionStatus) -> bool,
    ) -> Result<Redemption, RewardError> {
        let now = self.clock.now();
        let mut redemption: Redemption = self.store.require(redemption_id)?;

        if redemption.is_stale(now) {
            redemption.set_status(RedemptionStatus::Expired, now);
            self.store.update(&redemption)?;
            self.notify(false);
            return Err(RewardError::Expired(redemption_id));
        }
        if !allowed_from(redemption.status) {
            return Err(RewardError::InvalidTransition {
                from: redemption.status,
                to,
            });
        }

        redemption.set_status(to, now);
        self.store.update(&redemption)?;
        self.notify(false);

        tracing::info!("Redemption {} is now {}", redemption_id, to);
        Ok(redemption)
    }

    /// Expire an owner's open redemptions past their expiry.
    ///
    /// Spent points are not refunded. Returns how many expired.
    pub fn expire_stale(&self, owner_id: Uuid) -> Result<usize, RewardError> {
        let now = self.clock.now();
        let mut expired = 0;

        for mut redemption in self.list(owner_id)? {
            if redemption.is_stale(now) {
                redemption.set_status(RedemptionStatus::Expired, now);
                self.store.update(&redemption)?;
                expired += 1;
            }
        }

        if expired > 0 {
            tracing::info!("Expired {} redemptions for {}", expired, owner_id);
            self.notify(false);
        }
        Ok(expired)
    }

    /// Redemptions for an owner, oldest first.
    pub fn list(&self, owner_id: Uuid) -> Result<Vec<Redemption>, RewardError> {
        Ok(self
            .store
            .query_by_index(IndexQuery::Owner(owner_id), None)?)
    }

    fn notify(&self, user_changed: bool) {
        if let Some(sync) = &self.sync {
            if user_changed {
                sync.record_written(EntityKind::Users);
            }
            sync.record_written(EntityKind::Redemptions);
        }
    }
}

/// Reward errors.
#[derive(Debug, Error)]
pub enum RewardError {
    #[error("Insufficient points: have {available}, need {required}")]
    InsufficientPoints { available: u32, required: u32 },

    #[error("No user aggregate for {0}; sign in first")]
    NotSignedIn(Uuid),

    #[error("Redemption {0} has expired")]
    Expired(Uuid),

    #[error("Cannot move redemption from {from} to {to}")]
    InvalidTransition {
        from: RedemptionStatus,
        to: RedemptionStatus,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::Record;
    use chrono::{Duration, TimeZone, Utc};

    struct Fixture {
        service: RewardService,
        store: LocalStore,
        clock: ManualClock,
        owner: Uuid,
    }

    fn fixture(points: u32) -> Fixture {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
        let store = LocalStore::open_in_memory().unwrap();
        let owner = Uuid::new_v4();

        let mut user = UserAggregate::new(owner, None, clock.now());
        user.set_points(points);
        store.create(&user).unwrap();

        Fixture {
            service: RewardService::new(store.clone(), Arc::new(clock.clone()), None),
            store,
            clock,
            owner,
        }
    }

    #[test]
    fn test_redeem_deducts_and_records() {
        let f = fixture(650);
        let reward = Reward::new("zoo", "Zoo ticket", 500);

        let redemption = f.service.redeem_reward(f.owner, &reward).unwrap();
        assert_eq!(redemption.status, RedemptionStatus::Pending);

        let user: UserAggregate = f.store.require(f.owner).unwrap();
        assert_eq!(user.points, 150);
        assert_eq!(user.level, 2);
        assert_eq!(f.service.list(f.owner).unwrap().len(), 1);
    }

    #[test]
    fn test_insufficient_points_changes_nothing() {
        let f = fixture(400);
        let reward = Reward::new("zoo", "Zoo ticket", 500);

        let err = f.service.redeem_reward(f.owner, &reward).unwrap_err();
        assert!(matches!(
            err,
            RewardError::InsufficientPoints {
                available: 400,
                required: 500
            }
        ));

        let user: UserAggregate = f.store.require(f.owner).unwrap();
        assert_eq!(user.points, 400);
        assert!(f.service.list(f.owner).unwrap().is_empty());
    }

    #[test]
    fn test_lifecycle() {
        let f = fixture(100);
        let reward = Reward::new("sticker", "Sticker pack", 50);
        let r = f.service.redeem_reward(f.owner, &reward).unwrap();

        assert!(matches!(
            f.service.mark_used(r.id()),
            Err(RewardError::InvalidTransition { .. })
        ));
        assert_eq!(
            f.service.approve(r.id()).unwrap().status,
            RedemptionStatus::Approved
        );
        assert_eq!(
            f.service.mark_used(r.id()).unwrap().status,
            RedemptionStatus::Used
        );
        assert!(f.service.approve(r.id()).is_err());
    }

    #[test]
    fn test_stale_redemptions_expire() {
        let f = fixture(200);
        let reward = Reward::new("sticker", "Sticker pack", 50).valid_for_days(3);
        let first = f.service.redeem_reward(f.owner, &reward).unwrap();
        f.service.redeem_reward(f.owner, &reward).unwrap();

        f.clock.advance(Duration::days(3));
        assert!(matches!(
            f.service.approve(first.id()),
            Err(RewardError::Expired(_))
        ));
        assert_eq!(f.service.expire_stale(f.owner).unwrap(), 1);
        assert!(f
            .service
            .list(f.owner)
            .unwrap()
            .iter()
            .all(|r| r.status == RedemptionStatus::Expired));

        let user: UserAggregate = f.store.require(f.owner).unwrap();
        assert_eq!(user.points, 100);
    }
}
