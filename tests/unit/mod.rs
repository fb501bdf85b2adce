//! Unit test modules.

mod assessment_scoring_test;
mod calendar_day_test;
mod point_rules_test;
mod redemption_code_test;
