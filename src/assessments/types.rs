//! EQ assessment type definitions.

use crate::storage::{EntityKind, Envelope, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Emotional-intelligence area a question measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqCategory {
    SelfAwareness,
    SelfRegulation,
    Empathy,
    SocialSkills,
    Motivation,
}

impl EqCategory {
    pub const ALL: [EqCategory; 5] = [
        EqCategory::SelfAwareness,
        EqCategory::SelfRegulation,
        EqCategory::Empathy,
        EqCategory::SocialSkills,
        EqCategory::Motivation,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            EqCategory::SelfAwareness => "Self-awareness",
            EqCategory::SelfRegulation => "Self-regulation",
            EqCategory::Empathy => "Empathy",
            EqCategory::SocialSkills => "Social skills",
            EqCategory::Motivation => "Motivation",
        }
    }
}

/// Reading of a 0-100 category score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpretation {
    /// 75 and above
    Strength,
    /// 50 to 74
    Developing,
    /// Below 50
    NeedsSupport,
}

impl Interpretation {
    pub fn for_score(score: u32) -> Self {
        match score {
            75.. => Interpretation::Strength,
            50..=74 => Interpretation::Developing,
            _ => Interpretation::NeedsSupport,
        }
    }
}

/// One answered question, on a 1-5 agreement scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResponse {
    pub question_id: String,
    pub category: EqCategory,
    pub value: u8,
}

impl AssessmentResponse {
    pub fn new(question_id: &str, category: EqCategory, value: u8) -> Self {
        Self {
            question_id: question_id.to_string(),
            category,
            value,
        }
    }
}

/// Input for `AssessmentService::save_assessment`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAssessment {
    pub owner_id: Uuid,
    pub responses: Vec<AssessmentResponse>,
}

/// A completed assessment. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentRecord {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub responses: Vec<AssessmentResponse>,
    /// 0-100 per answered category
    pub category_scores: BTreeMap<EqCategory, u32>,
    pub interpretations: BTreeMap<EqCategory, Interpretation>,
    /// Mean of the category scores
    pub overall_score: u32,
    pub completed_at: DateTime<Utc>,
}

impl AssessmentRecord {
    /// Categories scored below 50.
    pub fn focus_areas(&self) -> Vec<EqCategory> {
        self.interpretations
            .iter()
            .filter(|(_, i)| **i == Interpretation::NeedsSupport)
            .map(|(c, _)| *c)
            .collect()
    }
}

impl Record for AssessmentRecord {
    const KIND: EntityKind = EntityKind::Assessments;

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.completed_at
    }
}
