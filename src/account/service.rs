//! Sign-in and sign-out.

use super::types::UserAggregate;
use crate::clock::Clock;
use crate::storage::{EntityKind, LocalStore, PurgeSummary, StorageError};
use crate::sync::SyncHandle;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Owns the user aggregate lifecycle.
#[derive(Clone)]
pub struct AccountService {
    store: LocalStore,
    clock: Arc<dyn Clock>,
    sync: Option<SyncHandle>,
}

impl AccountService {
    pub fn new(store: LocalStore, clock: Arc<dyn Clock>, sync: Option<SyncHandle>) -> Self {
        Self { store, clock, sync }
    }

    /// Get or create the aggregate for an owner supplied by the identity
    /// provider. A new display name replaces the stored one.
    pub fn sign_in(
        &self,
        owner_id: Uuid,
        display_name: Option<&str>,
    ) -> Result<UserAggregate, AccountError> {
        let now = self.clock.now();

        let user = match self.store.get::<UserAggregate>(owner_id)? {
            Some(mut user) => {
                match display_name {
                    Some(name) if user.display_name.as_deref() != Some(name) => {
                        user.display_name = Some(name.to_string());
                        user.touch(now);
                        self.store.update(&user)?;
                        self.notify();
                    }
                    _ => {}
                }
                user
            }
            None => {
                let user = UserAggregate::new(owner_id, display_name.map(str::to_string), now);
                self.store.create(&user)?;
                tracing::info!("Created user aggregate for {}", owner_id);
                self.notify();
                user
            }
        };

        Ok(user)
    }

    /// Current aggregate for a signed-in owner.
    pub fn user(&self, owner_id: Uuid) -> Result<UserAggregate, AccountError> {
        self.store
            .get(owner_id)?
            .ok_or(AccountError::NotSignedIn(owner_id))
    }

    /// Purge everything stored locally for the owner. Called on sign-out.
    ///
    /// Unsynced records are lost; check the pending count first if that
    /// matters.
    pub fn sign_out(&self, owner_id: Uuid) -> Result<PurgeSummary, AccountError> {
        Ok(self.store.clear_user_data(owner_id)?)
    }

    fn notify(&self) {
        if let Some(sync) = &self.sync {
            sync.record_written(EntityKind::Users);
        }
    }
}

/// Account errors.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("No user aggregate for {0}; sign in first")]
    NotSignedIn(Uuid),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
