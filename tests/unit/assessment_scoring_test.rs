//! Unit tests for EQ assessment scoring.

use tinysteps::assessments::{
    score, validate, AssessmentError, AssessmentResponse, EqCategory, Interpretation,
};

fn answer(id: &str, category: EqCategory, value: u8) -> AssessmentResponse {
    AssessmentResponse::new(id, category, value)
}

#[test]
fn test_scale_endpoints() {
    let low = score(&[answer("q1", EqCategory::Empathy, 1)]);
    let high = score(&[answer("q1", EqCategory::Empathy, 5)]);
    let mid = score(&[answer("q1", EqCategory::Empathy, 3)]);

    assert_eq!(low.categories[&EqCategory::Empathy], 0);
    assert_eq!(high.categories[&EqCategory::Empathy], 100);
    assert_eq!(mid.categories[&EqCategory::Empathy], 50);
}

#[test]
fn test_category_means_and_overall() {
    let responses = vec![
        answer("e1", EqCategory::Empathy, 5),
        answer("e2", EqCategory::Empathy, 4),
        answer("m1", EqCategory::Motivation, 2),
        answer("m2", EqCategory::Motivation, 2),
    ];
    let scores = score(&responses);

    // mean 4.5 -> 87.5 -> 88; mean 2 -> 25
    assert_eq!(scores.categories[&EqCategory::Empathy], 88);
    assert_eq!(scores.categories[&EqCategory::Motivation], 25);
    assert_eq!(scores.overall, 57);

    assert_eq!(
        scores.interpretations[&EqCategory::Empathy],
        Interpretation::Strength
    );
    assert_eq!(
        scores.interpretations[&EqCategory::Motivation],
        Interpretation::NeedsSupport
    );
    assert!(!scores.categories.contains_key(&EqCategory::SocialSkills));
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
fn test_validation_errors() {
    assert!(matches!(validate(&[]), Err(AssessmentError::NoResponses)));
    assert!(matches!(
        validate(&[answer("q1", EqCategory::Empathy, 6)]),
        Err(AssessmentError::OutOfRange { value: 6, .. })
    ));
    assert!(matches!(
        validate(&[answer("q1", EqCategory::Empathy, 0)]),
        Err(AssessmentError::OutOfRange { value: 0, .. })
    ));
    assert!(matches!(
        validate(&[
            answer("q1", EqCategory::Empathy, 3),
            answer("q1", EqCategory::Motivation, 3),
        ]),
        Err(AssessmentError::DuplicateQuestion(q)) if q == "q1"
    ));
}
