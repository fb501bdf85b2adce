//! Local-to-remote synchronization.
//!
//! Records are committed locally first and pushed later by the
//! [`SyncEngine`]. Domain services hold a [`SyncHandle`] to request passes
//! without waiting on the network.

pub mod engine;
pub mod handle;
pub mod http;
pub mod memory;
pub mod remote;
pub mod types;

pub use engine::{SyncEngine, SyncError};
pub use handle::SyncHandle;
pub use http::{HttpMediaStore, HttpRemoteStore};
pub use memory::{InMemoryMediaStore, InMemoryRemoteStore};
pub use remote::{MediaStore, QueryFilter, RemoteError, RemoteStore};
pub use types::{
    PassOutcome, SkipReason, SyncErrorNote, SyncEvent, SyncReport, SyncState, SyncStatus,
    SyncTrigger,
};
