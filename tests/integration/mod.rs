//! Integration test modules.

mod activity_flow_test;
mod fixtures;
mod rewards_test;
mod sync_test;
