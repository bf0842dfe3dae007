//! OS keyring-backed token storage implementation.

use async_trait::async_trait;
use keyring::Entry;

use super::{MemoryTokenStore, StoreError, TokenStore};
use crate::model::ServiceId;
use crate::token::{AccessTokenRecord, RefreshTokenRecord};

/// Token store that persists refresh tokens in the platform keyring:
///
/// - macOS: Keychain
/// - Linux: Secret Service API (via libsecret)
/// - Windows: Credential Manager
///
/// Only the long-lived refresh token records are persisted; access tokens
/// and the user id are short-lived session state and stay in memory.
/// Records are serialized to JSON before storage, so the keyring only ever
/// sees an opaque string.
///
/// # Storage Key Format
///
/// Entries are stored under `{service_name}/{service_id}/refresh_token`.
pub struct KeyringTokenStore {
    service_name: String,
    session: MemoryTokenStore,
}

impl KeyringTokenStore {
    /// Try to create a new keyring-backed store.
    ///
    /// Returns an error if the keyring backend is not available on this
    /// platform.
    pub fn try_new(service_name: &str) -> Result<Self, StoreError> {
        // Validate that keyring is available by attempting to create a test entry
        let test_key = format!("{}/__test__", service_name);
        match Entry::new(&test_key, "availability_check") {
            Ok(_) => Ok(Self {
                service_name: service_name.to_string(),
                session: MemoryTokenStore::new(),
            }),
            Err(e) => Err(StoreError::KeyringUnavailable {
                message: format!("keyring backend not available: {}", e),
            }),
        }
    }

    fn refresh_entry(&self, service: ServiceId) -> Result<Entry, StoreError> {
        let key = format!("{}/{}/refresh_token", self.service_name, service);
        Entry::new(&key, "questgate").map_err(|e| StoreError::BackendError {
            message: format!("failed to create keyring entry: {}", e),
        })
    }
}

impl std::fmt::Debug for KeyringTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringTokenStore")
            .field("service_name", &self.service_name)
            .finish()
    }
}

#[async_trait]
impl TokenStore for KeyringTokenStore {
    async fn access_token(
        &self,
        service: ServiceId,
    ) -> Result<Option<AccessTokenRecord>, StoreError> {
        self.session.access_token(service).await
    }

    async fn set_access_token(
        &self,
        service: ServiceId,
        record: AccessTokenRecord,
    ) -> Result<(), StoreError> {
        self.session.set_access_token(service, record).await
    }

    async fn refresh_token(
        &self,
        service: ServiceId,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let entry = self.refresh_entry(service)?;

        match entry.get_password() {
            Ok(payload) => {
                let record: RefreshTokenRecord = serde_json::from_str(&payload)?;
                Ok(Some(record))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::BackendError {
                message: format!("keyring error: {}", e),
            }),
        }
    }

    async fn set_refresh_token(
        &self,
        service: ServiceId,
        record: RefreshTokenRecord,
    ) -> Result<(), StoreError> {
        let entry = self.refresh_entry(service)?;
        let payload = serde_json::to_string(&record)?;

        entry
            .set_password(&payload)
            .map_err(|e| StoreError::BackendError {
                message: format!("failed to set keyring password: {}", e),
            })?;

        tracing::debug!(service = %service, "refresh token record persisted to keyring");
        Ok(())
    }

    async fn user_id(&self) -> Result<Option<String>, StoreError> {
        self.session.user_id().await
    }

    async fn set_user_id(&self, user_id: String) -> Result<(), StoreError> {
        self.session.set_user_id(user_id).await
    }

    async fn clear_session(&self, service: ServiceId) -> Result<(), StoreError> {
        self.session.clear_session(service).await
    }
}
