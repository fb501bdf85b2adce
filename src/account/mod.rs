//! Account lifecycle and the per-owner user aggregate.

pub mod service;
pub mod types;

pub use service::{AccountError, AccountService};
pub use types::UserAggregate;
