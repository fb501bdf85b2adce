//! Response validation and category scoring.

use super::types::{AssessmentResponse, EqCategory, Interpretation};
use super::AssessmentError;
use std::collections::{BTreeMap, HashSet};

/// Lowest answer on the agreement scale.
pub const MIN_RESPONSE: u8 = 1;

/// Highest answer on the agreement scale.
pub const MAX_RESPONSE: u8 = 5;

/// Scores derived from a set of responses.
#[derive(Debug, Clone, PartialEq)]
pub struct Scores {
    pub categories: BTreeMap<EqCategory, u32>,
    pub interpretations: BTreeMap<EqCategory, Interpretation>,
    pub overall: u32,
}

/// Reject empty sets, out-of-scale answers and repeated questions.
pub fn validate(responses: &[AssessmentResponse]) -> Result<(), AssessmentError> {
    if responses.is_empty() {
        return Err(AssessmentError::NoResponses);
    }

    let mut seen = HashSet::new();
    for response in responses {
        if !(MIN_RESPONSE..=MAX_RESPONSE).contains(&response.value) {
            return Err(AssessmentError::OutOfRange {
                question_id: response.question_id.clone(),
                value: response.value,
            });
        }
        if !seen.insert(response.question_id.as_str()) {
            return Err(AssessmentError::DuplicateQuestion(
                response.question_id.clone(),
            ));
        }
    }
    Ok(())
}

/// Map a mean answer in 1..=5 onto 0..=100.
fn scale(mean: f64) -> u32 {
    let span = f64::from(MAX_RESPONSE - MIN_RESPONSE);
    (((mean - f64::from(MIN_RESPONSE)) / span) * 100.0)
        .round()
        .clamp(0.0, 100.0) as u32
}

/// Score validated responses. Categories without answers are left out.
pub fn score(responses: &[AssessmentResponse]) -> Scores {
    let mut sums: BTreeMap<EqCategory, (u32, u32)> = BTreeMap::new();
    for response in responses {
        let entry = sums.entry(response.category).or_default();
        entry.0 += u32::from(response.value);
        entry.1 += 1;
    }

    let categories: BTreeMap<EqCategory, u32> = sums
        .into_iter()
        .map(|(category, (sum, count))| (category, scale(f64::from(sum) / f64::from(count))))
        .collect();

    let interpretations = categories
        .iter()
        .map(|(category, score)| (*category, Interpretation::for_score(*score)))
        .collect();

    let overall = if categories.is_empty() {
        0
    } else {
        let total: u32 = categories.values().sum();
        (f64::from(total) / categories.len() as f64).round() as u32
    };

    Scores {
        categories,
        interpretations,
        overall,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(id: &str, category: EqCategory, value: u8) -> AssessmentResponse {
        AssessmentResponse::new(id, category, value)
    }

    #[test]
    fn test_scale_endpoints() {
        assert_eq!(scale(1.0), 0);
        assert_eq!(scale(3.0), 50);
        assert_eq!(scale(5.0), 100);
        assert_eq!(scale(4.0), 75);
    }

    #[test]
    fn test_interpretation_bands() {
        assert_eq!(Interpretation::for_score(100), Interpretation::Strength);
        assert_eq!(Interpretation::for_score(75), Interpretation::Strength);
        assert_eq!(Interpretation::for_score(74), Interpretation::Developing);
        assert_eq!(Interpretation::for_score(50), Interpretation::Developing);
        assert_eq!(Interpretation::for_score(49), Interpretation::NeedsSupport);
    }

    #[test]
    fn test_score_per_category() {
        let responses = vec![
            r("q1", EqCategory::Empathy, 5),
            r("q2", EqCategory::Empathy, 4),
            r("q3", EqCategory::Motivation, 2),
        ];
        let scores = score(&responses);

        // Empathy mean 4.5 -> 87.5 -> 88, motivation mean 2 -> 25
        assert_eq!(scores.categories[&EqCategory::Empathy], 88);
        assert_eq!(scores.categories[&EqCategory::Motivation], 25);
        assert!(!scores.categories.contains_key(&EqCategory::SocialSkills));
        assert_eq!(
            scores.interpretations[&EqCategory::Motivation],
            Interpretation::NeedsSupport
        );
        assert_eq!(scores.overall, 57);
    }

    #[test]
    fn test_validation() {
        assert!(matches!(validate(&[]), Err(AssessmentError::NoResponses)));
        assert!(matches!(
            validate(&[r("q1", EqCategory::Empathy, 0)]),
            Err(AssessmentError::OutOfRange { value: 0, .. })
        ));
        assert!(matches!(
            validate(&[r("q1", EqCategory::Empathy, 6)]),
            Err(AssessmentError::OutOfRange { value: 6, .. })
        ));
        assert!(matches!(
            validate(&[
                r("q1", EqCategory::Empathy, 3),
                r("q1", EqCategory::Empathy, 4)
            ]),
            Err(AssessmentError::DuplicateQuestion(_))
        ));
        assert!(validate(&[r("q1", EqCategory::Empathy, 3)]).is_ok());
    }
}
