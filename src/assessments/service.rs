//! Assessment scoring and persistence.

use super::scoring::{score, validate};
use super::types::{AssessmentRecord, NewAssessment};
use super::AssessmentError;
use crate::clock::Clock;
use crate::storage::{EntityKind, Envelope, IndexQuery, LocalStore};
use crate::sync::SyncHandle;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct AssessmentService {
    store: LocalStore,
    clock: Arc<dyn Clock>,
    sync: Option<SyncHandle>,
}

impl AssessmentService {
    pub fn new(store: LocalStore, clock: Arc<dyn Clock>, sync: Option<SyncHandle>) -> Self {
        Self { store, clock, sync }
    }

    /// Validate, score locally and store an assessment.
    pub fn save_assessment(
        &self,
        input: NewAssessment,
    ) -> Result<AssessmentRecord, AssessmentError> {
        validate(&input.responses)?;
        let scores = score(&input.responses);

        let record = AssessmentRecord {
            envelope: Envelope::new(input.owner_id),
            responses: input.responses,
            category_scores: scores.categories,
            interpretations: scores.interpretations,
            overall_score: scores.overall,
            completed_at: self.clock.now(),
        };
        self.store.create(&record)?;

        tracing::info!(
            "Saved assessment for {} (overall {})",
            input.owner_id,
            record.overall_score
        );

        if let Some(sync) = &self.sync {
            sync.record_written(EntityKind::Assessments);
        }
        Ok(record)
    }

    /// All assessments for an owner, oldest first.
    pub fn history(&self, owner_id: Uuid) -> Result<Vec<AssessmentRecord>, AssessmentError> {
        Ok(self
            .store
            .query_by_index(IndexQuery::Owner(owner_id), None)?)
    }

    pub fn latest(&self, owner_id: Uuid) -> Result<Option<AssessmentRecord>, AssessmentError> {
        Ok(self.history(owner_id)?.pop())
    }
}
