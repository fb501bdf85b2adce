//! Integration tests for redeeming rewards.

use super::fixtures::test_app;
use chrono::Duration;
use tinysteps::rewards::{RedemptionStatus, RewardError};
use tinysteps::storage::Record;
use tinysteps::{NewActivity, Reward};

fn earn_walks(app: &super::fixtures::TestApp, walks: u32) {
    for _ in 0..walks {
        app.services
            .activities
            .save_activity(NewActivity::new(app.owner, "outdoor_walk", 1800))
            .unwrap();
    }
}

#[test]
fn test_insufficient_points_leaves_state_unchanged() {
    let app = test_app(None);
    earn_walks(&app, 40);
    let before = app.services.accounts.user(app.owner).unwrap();
    assert_eq!(before.points, 400);

    let reward = Reward::new("zoo_ticket", "Zoo ticket", 500);
    let err = app
        .services
        .rewards
        .redeem_reward(app.owner, &reward)
        .unwrap_err();
    assert!(matches!(
        err,
        RewardError::InsufficientPoints {
            available: 400,
            required: 500
        }
    ));

    let after = app.services.accounts.user(app.owner).unwrap();
    assert_eq!(after, before);
    assert!(app.services.rewards.list(app.owner).unwrap().is_empty());
}

#[test]
fn test_redeem_then_partner_flow() {
    let app = test_app(None);
    earn_walks(&app, 60);

    let reward = Reward::new("zoo_ticket", "Zoo ticket", 500).valid_for_days(14);
    let redemption = app
        .services
        .rewards
        .redeem_reward(app.owner, &reward)
        .unwrap();
    assert_eq!(redemption.status, RedemptionStatus::Pending);
    assert_eq!(redemption.expires_at - redemption.redeemed_at, Duration::days(14));

    let user = app.services.accounts.user(app.owner).unwrap();
    assert_eq!(user.points, 100);
    assert_eq!(user.level, 2);

    app.clock.advance(Duration::days(2));
    app.services.rewards.approve(redemption.id()).unwrap();
    let used = app.services.rewards.mark_used(redemption.id()).unwrap();
    assert_eq!(used.status, RedemptionStatus::Used);

    // Closed redemptions never expire
    app.clock.advance(Duration::days(30));
    assert_eq!(app.services.rewards.expire_stale(app.owner).unwrap(), 0);
}

#[test]
fn test_expired_redemption_keeps_points_spent() {
    let app = test_app(None);
    earn_walks(&app, 10);

    let reward = Reward::new("sticker", "Sticker pack", 50).valid_for_days(1);
    let redemption = app
        .services
        .rewards
        .redeem_reward(app.owner, &reward)
        .unwrap();

    app.clock.advance(Duration::days(2));
    assert!(matches!(
        app.services.rewards.approve(redemption.id()),
        Err(RewardError::Expired(_))
    ));
    assert_eq!(
        app.services.rewards.list(app.owner).unwrap()[0].status,
        RedemptionStatus::Expired
    );
    assert_eq!(app.services.accounts.user(app.owner).unwrap().points, 50);
}
