//! Integration tests for logging activities end to end.
//!
//! Covers daily caps, streaks across days, challenges, achievements and
//! assessments through the public service API.

use super::fixtures::test_app;
use chrono::Duration;
use tinysteps::account::AccountError;
use tinysteps::assessments::{AssessmentResponse, EqCategory, Interpretation, NewAssessment};
use tinysteps::progress::{unlock_id, ChallengeDefinition};
use tinysteps::storage::{EntityKind, Record};
use tinysteps::NewActivity;

#[test]
fn test_reading_cap_across_submissions() {
    let app = test_app(None);
    let activities = &app.services.activities;

    let awarded: Vec<u32> = [6, 6, 10]
        .iter()
        .map(|m| {
            activities
                .save_activity(NewActivity::minutes(app.owner, "reading", *m))
                .unwrap()
                .points_awarded
        })
        .collect();
    assert_eq!(awarded, vec![6, 6, 3]);

    let user = app.services.accounts.user(app.owner).unwrap();
    assert_eq!(user.points, 15);
    assert_eq!(user.total_activities, 3);
    assert_eq!(user.streak, 1);

    let limit = app
        .services
        .points
        .check_daily_limit(app.owner, "reading")
        .unwrap();
    assert!(!limit.can_earn);
    assert_eq!(limit.remaining_points, Some(0));
    assert_eq!(limit.earned_today, 15);
}

#[test]
fn test_affection_once_per_day_resets_next_day() {
    let app = test_app(None);
    let activities = &app.services.activities;
    let affection = || NewActivity::new(app.owner, "affection", 0);

    assert_eq!(activities.save_activity(affection()).unwrap().points_awarded, 5);
    assert_eq!(activities.save_activity(affection()).unwrap().points_awarded, 0);

    app.clock.advance(Duration::days(1));
    assert_eq!(activities.save_activity(affection()).unwrap().points_awarded, 5);

    let user = app.services.accounts.user(app.owner).unwrap();
    assert_eq!(user.points, 10);
    assert_eq!(user.streak, 2);
}

#[test]
fn test_streak_across_days() {
    let app = test_app(None);
    let activities = &app.services.activities;
    let read = |minutes| {
        activities
            .save_activity(NewActivity::minutes(app.owner, "reading", minutes))
            .unwrap()
    };

    read(20);
    app.clock.advance(Duration::days(1));
    read(20);
    assert_eq!(app.services.accounts.user(app.owner).unwrap().streak, 2);

    // An attempt neither extends nor breaks the streak
    app.clock.advance(Duration::days(1));
    assert!(read(3).is_attempt());
    let user = app.services.accounts.user(app.owner).unwrap();
    assert_eq!(user.streak, 2);
    assert_eq!(user.current_streak(app.services.points.today()), 2);
    assert_eq!(user.points, 30);

    // A missed day resets it
    app.clock.advance(Duration::days(2));
    let user = app.services.accounts.user(app.owner).unwrap();
    assert_eq!(user.current_streak(app.services.points.today()), 0);

    read(10);
    assert_eq!(app.services.accounts.user(app.owner).unwrap().streak, 1);
}

#[test]
fn test_on_day_returns_that_day_only() {
    let app = test_app(None);
    let activities = &app.services.activities;

    activities
        .save_activity(NewActivity::minutes(app.owner, "reading", 10))
        .unwrap();
    let first_day = app.services.points.today();
    app.clock.advance(Duration::days(1));
    activities
        .save_activity(NewActivity::minutes(app.owner, "shared_play", 10))
        .unwrap();

    let day_one = activities.on_day(app.owner, first_day).unwrap();
    assert_eq!(day_one.len(), 1);
    assert_eq!(day_one[0].activity_kind, "reading");
    assert_eq!(activities.recent(app.owner, 10).unwrap().len(), 2);
}

#[test]
fn test_challenge_completion_grants_bonus() {
    let app = test_app(None);
    let reading_week = ChallengeDefinition::builtin()
        .into_iter()
        .find(|c| c.id == "reading_week")
        .unwrap();
    app.services
        .challenges
        .start_challenge(app.owner, &reading_week)
        .unwrap();

    for _ in 0..2 {
        app.services
            .activities
            .save_activity(NewActivity::minutes(app.owner, "reading", 30))
            .unwrap();
        app.clock.advance(Duration::days(1));
    }

    let progress = &app.services.challenges.list(app.owner).unwrap()[0];
    assert!(progress.completed);
    assert_eq!(progress.current, 60);

    // 15 + 15 capped reading points, plus the bonus
    let user = app.services.accounts.user(app.owner).unwrap();
    assert_eq!(user.points, 30 + reading_week.bonus_points);
    assert!(app.services.challenges.active(app.owner).unwrap().is_empty());
}

#[test]
fn test_achievements_unlock_once() {
    let app = test_app(None);
    for _ in 0..3 {
        app.services
            .activities
            .save_activity(NewActivity::new(app.owner, "affection", 0))
            .unwrap();
        app.clock.advance(Duration::days(1));
    }

    let keys: Vec<String> = app
        .services
        .achievements
        .unlocked(app.owner)
        .unwrap()
        .into_iter()
        .map(|u| u.key)
        .collect();
    assert!(keys.contains(&"first_activity".to_string()));
    assert!(keys.contains(&"streak_3".to_string()));
    assert_eq!(keys.iter().filter(|k| *k == "first_activity").count(), 1);

    let first = app
        .services
        .achievements
        .unlocked(app.owner)
        .unwrap()
        .into_iter()
        .find(|u| u.key == "first_activity")
        .unwrap();
    assert_eq!(first.id(), unlock_id(app.owner, "first_activity"));
}

#[test]
fn test_assessment_history() {
    let app = test_app(None);
    let responses = vec![
        AssessmentResponse::new("emp_1", EqCategory::Empathy, 5),
        AssessmentResponse::new("emp_2", EqCategory::Empathy, 4),
        AssessmentResponse::new("reg_1", EqCategory::SelfRegulation, 2),
    ];
    let saved = app
        .services
        .assessments
        .save_assessment(NewAssessment {
            owner_id: app.owner,
            responses,
        })
        .unwrap();

    assert_eq!(saved.focus_areas(), vec![EqCategory::SelfRegulation]);
    assert_eq!(
        saved.interpretations[&EqCategory::Empathy],
        Interpretation::Strength
    );

    let latest = app.services.assessments.latest(app.owner).unwrap().unwrap();
    assert_eq!(latest.id(), saved.id());
    assert_eq!(app.services.assessments.history(app.owner).unwrap().len(), 1);
}

#[test]
fn test_sign_out_purges_local_data() {
    let app = test_app(None);
    app.services
        .activities
        .save_activity(NewActivity::minutes(app.owner, "reading", 10))
        .unwrap();

    let summary = app.services.accounts.sign_out(app.owner).unwrap();
    assert_eq!(summary.records.get(&EntityKind::Users), Some(&1));
    assert_eq!(summary.records.get(&EntityKind::Activities), Some(&1));

    assert!(matches!(
        app.services.accounts.user(app.owner),
        Err(AccountError::NotSignedIn(_))
    ));
    assert!(app.services.activities.recent(app.owner, 10).unwrap().is_empty());
}
