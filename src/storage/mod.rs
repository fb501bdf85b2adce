//! Storage module for the local record store and configuration.

pub mod config;
pub mod database;
pub mod record;
pub mod schema;

pub use config::{AppConfig, CalendarSettings, ConfigError, StorageSettings, SyncSettings};
pub use database::{LocalStore, MediaBlob, PurgeSummary, StorageError, StoreTxn};
pub use record::{EntityKind, Envelope, IndexQuery, Record};
