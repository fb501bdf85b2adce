//! Unit tests for point rules and leveling.

use chrono::Utc;
use proptest::prelude::*;
use tinysteps::activities::ActivityRecord;
use tinysteps::points::catalog::{AFFECTION_DAILY_POINTS, READING_DAILY_CAP};
use tinysteps::points::{
    calculate_points, is_qualifying, level_for_points, ActivityCatalog, ActivityCategory,
    ActivityDefinition,
};
use tinysteps::storage::Envelope;
use uuid::Uuid;

fn record(definition: &ActivityDefinition, minutes: u32, points: u32) -> ActivityRecord {
    ActivityRecord {
        envelope: Envelope::new(Uuid::new_v4()),
        activity_kind: definition.id.clone(),
        category: definition.category,
        duration_seconds: minutes * 60,
        points_awarded: points,
        qualifying: is_qualifying(definition, minutes * 60),
        notes: None,
        media: None,
        created_at: Utc::now(),
    }
}

/// Feed a day's submissions through the calculator, in order.
fn award_sequence(definition: &ActivityDefinition, minutes: &[u32]) -> Vec<u32> {
    let mut history = Vec::new();
    let mut awards = Vec::new();
    for &m in minutes {
        let points = calculate_points(definition, m * 60, &history);
        history.push(record(definition, m, points));
        awards.push(points);
    }
    awards
}

fn builtin(kind: &str) -> ActivityDefinition {
    ActivityCatalog::builtin().get(kind).unwrap().clone()
}

#[test]
fn test_reading_stops_at_daily_cap() {
    let reading = builtin("reading");
    assert_eq!(award_sequence(&reading, &[6, 6, 10]), vec![6, 6, 3]);
    assert_eq!(award_sequence(&reading, &[30]), vec![READING_DAILY_CAP]);
}

#[test]
fn test_reading_below_minimum_earns_nothing() {
    let reading = builtin("reading");
    assert_eq!(award_sequence(&reading, &[4, 0]), vec![0, 0]);
    assert!(!is_qualifying(&reading, 4 * 60 + 59));
    assert!(is_qualifying(&reading, 5 * 60));
}

#[test]
fn test_partial_minutes_are_truncated() {
    let reading = builtin("reading");
    assert_eq!(calculate_points(&reading, 7 * 60 + 59, &[]), 7);
}

#[test]
fn test_attempt_does_not_use_up_cap() {
    let reading = builtin("reading");
    assert_eq!(award_sequence(&reading, &[3, 15]), vec![0, 15]);
}

#[test]
fn test_affection_once_per_day() {
    let affection = builtin("affection");
    assert_eq!(
        award_sequence(&affection, &[0, 0, 10]),
        vec![AFFECTION_DAILY_POINTS, 0, 0]
    );
}

#[test]
fn test_history_of_other_kinds_is_ignored() {
    let reading = builtin("reading");
    let play = builtin("shared_play");
    let history = vec![record(&play, 20, 20)];
    assert_eq!(calculate_points(&reading, 10 * 60, &history), 10);
}

#[test]
fn test_fixed_kind_is_uncapped() {
    let walk = builtin("outdoor_walk");
    assert_eq!(award_sequence(&walk, &[1, 1, 1]), vec![10, 10, 10]);
}

#[test]
fn test_catalog_categories() {
    let catalog = ActivityCatalog::builtin();
    assert_eq!(
        catalog.get("reading").unwrap().category,
        ActivityCategory::Learning
    );
    assert!(catalog.get("juggling").is_none());
}

#[test]
fn test_level_boundaries() {
    assert_eq!(level_for_points(0), 1);
    assert_eq!(level_for_points(99), 1);
    assert_eq!(level_for_points(100), 2);
    assert_eq!(level_for_points(650), 7);
}

proptest! {
    #[test]
    fn prop_rate_capped_total_never_exceeds_cap(
        minutes in prop::collection::vec(0u32..120, 1..12)
    ) {
        let reading = builtin("reading");
        let awards = award_sequence(&reading, &minutes);
        let total: u32 = awards.iter().sum();
        prop_assert!(total <= READING_DAILY_CAP);

        for (m, points) in minutes.iter().zip(&awards) {
            if *m < 5 {
                prop_assert_eq!(*points, 0);
            }
            prop_assert!(*points <= *m);
        }
    }

    #[test]
    fn prop_flat_daily_awards_once(
        minutes in prop::collection::vec(0u32..60, 1..10)
    ) {
        let affection = builtin("affection");
        let awards = award_sequence(&affection, &minutes);
        prop_assert_eq!(awards.iter().filter(|p| **p > 0).count(), 1);
        prop_assert_eq!(awards[0], AFFECTION_DAILY_POINTS);
    }

    #[test]
    fn prop_level_tracks_points(points in 0u32..1_000_000) {
        let level = level_for_points(points);
        prop_assert_eq!(level, points / 100 + 1);
        prop_assert!(level >= 1);
    }
}
