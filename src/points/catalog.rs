//! Activity kinds and the point rule each one follows.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Category an activity kind belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityCategory {
    /// Reading and early literacy
    Learning,
    /// Shared, child-led play
    Play,
    /// Physical affection and connection
    Bonding,
    /// Everyday care routines
    Care,
    /// Time outside
    Outdoor,
    /// Arts, crafts and making things together
    Creative,
}

impl std::fmt::Display for ActivityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityCategory::Learning => write!(f, "Learning"),
            ActivityCategory::Play => write!(f, "Play"),
            ActivityCategory::Bonding => write!(f, "Bonding"),
            ActivityCategory::Care => write!(f, "Care"),
            ActivityCategory::Outdoor => write!(f, "Outdoor"),
            ActivityCategory::Creative => write!(f, "Creative"),
        }
    }
}

/// How an activity kind earns points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PointRule {
    /// Points per completed minute, once the minimum is met, up to a daily cap.
    RateCapped {
        points_per_minute: u32,
        min_minutes: u32,
        daily_cap: u32,
    },
    /// A fixed amount for the first submission of the day, then nothing.
    FlatDaily { points: u32 },
    /// A fixed amount every time, uncapped.
    Fixed { points: u32 },
}

impl PointRule {
    /// Most points this kind can earn in one calendar day, if bounded.
    pub fn daily_cap(&self) -> Option<u32> {
        match self {
            PointRule::RateCapped { daily_cap, .. } => Some(*daily_cap),
            PointRule::FlatDaily { points } => Some(*points),
            PointRule::Fixed { .. } => None,
        }
    }
}

/// One activity kind in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDefinition {
    /// Stable kind id stored on activity records
    pub id: String,
    /// Display name
    pub name: String,
    pub category: ActivityCategory,
    pub rule: PointRule,
}

impl ActivityDefinition {
    pub fn new(id: &str, name: &str, category: ActivityCategory, rule: PointRule) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            category,
            rule,
        }
    }
}

/// Reading earns one point per minute up to this many points a day.
pub const READING_DAILY_CAP: u32 = 15;

/// Minimum minutes before a rate-capped activity earns anything.
pub const MIN_RATED_MINUTES: u32 = 5;

/// Points for the first affection activity of the day.
pub const AFFECTION_DAILY_POINTS: u32 = 5;

/// Lookup table of activity kinds.
#[derive(Debug, Clone, Default)]
pub struct ActivityCatalog {
    definitions: BTreeMap<String, ActivityDefinition>,
}

impl ActivityCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog shipped with the app.
    ///
    /// Each capped category holds a single capped kind, so the per-kind daily
    /// cap is also the per-category cap.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();

        catalog.insert(ActivityDefinition::new(
            "reading",
            "Reading together",
            ActivityCategory::Learning,
            PointRule::RateCapped {
                points_per_minute: 1,
                min_minutes: MIN_RATED_MINUTES,
                daily_cap: READING_DAILY_CAP,
            },
        ));
        catalog.insert(ActivityDefinition::new(
            "shared_play",
            "Shared play",
            ActivityCategory::Play,
            PointRule::RateCapped {
                points_per_minute: 1,
                min_minutes: MIN_RATED_MINUTES,
                daily_cap: 20,
            },
        ));
        catalog.insert(ActivityDefinition::new(
            "affection",
            "Hugs and cuddles",
            ActivityCategory::Bonding,
            PointRule::FlatDaily {
                points: AFFECTION_DAILY_POINTS,
            },
        ));
        catalog.insert(ActivityDefinition::new(
            "outdoor_walk",
            "Outdoor walk",
            ActivityCategory::Outdoor,
            PointRule::Fixed { points: 10 },
        ));
        catalog.insert(ActivityDefinition::new(
            "bath_time",
            "Bath time",
            ActivityCategory::Care,
            PointRule::Fixed { points: 5 },
        ));
        catalog.insert(ActivityDefinition::new(
            "bedtime_routine",
            "Bedtime routine",
            ActivityCategory::Care,
            PointRule::Fixed { points: 5 },
        ));
        catalog.insert(ActivityDefinition::new(
            "arts_and_crafts",
            "Arts and crafts",
            ActivityCategory::Creative,
            PointRule::Fixed { points: 8 },
        ));

        catalog
    }

    /// Add or replace a definition.
    pub fn insert(&mut self, definition: ActivityDefinition) {
        self.definitions.insert(definition.id.clone(), definition);
    }

    pub fn get(&self, id: &str) -> Option<&ActivityDefinition> {
        self.definitions.get(id)
    }

    /// Definitions ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &ActivityDefinition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_builtin_reading_rule() {
        let catalog = ActivityCatalog::builtin();
        let reading = catalog.get("reading").unwrap();
        assert_eq!(reading.rule.daily_cap(), Some(15));
        assert_eq!(reading.category, ActivityCategory::Learning);
    }

    #[test]
    fn test_fixed_kinds_are_uncapped() {
        let catalog = ActivityCatalog::builtin();
        assert_eq!(catalog.get("outdoor_walk").unwrap().rule.daily_cap(), None);
    }

    #[test]
    fn test_capped_categories_hold_one_capped_kind() {
        let catalog = ActivityCatalog::builtin();
        let mut capped: HashMap<ActivityCategory, usize> = HashMap::new();
        for def in catalog.iter() {
            if def.rule.daily_cap().is_some() {
                *capped.entry(def.category).or_default() += 1;
            }
        }
        for def in catalog.iter() {
            if let Some(count) = capped.get(&def.category) {
                assert_eq!(*count, 1);
                assert!(def.rule.daily_cap().is_some(), "{} shares a capped category", def.id);
            }
        }
    }

    #[test]
    fn test_unknown_kind() {
        assert!(ActivityCatalog::builtin().get("skydiving").is_none());
    }
}
