//! Token storage abstraction.
//!
//! This module provides:
//! - [`TokenStore`] - Trait for per-service token storage backends
//! - [`MemoryTokenStore`] - In-memory implementation, the default and the
//!   test double
//! - [`KeyringTokenStore`] (with the `keyring-store` feature) - persists
//!   refresh tokens in the OS keyring
//!
//! The store is an external collaborator from the client layer's point of
//! view: the orchestrator reads a record copy per call and writes updated
//! records after a successful refresh. How a backend persists or encrypts
//! the material is its own concern; the contract only moves opaque strings
//! with expiry timestamps.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::ServiceId;
use crate::token::{AccessTokenRecord, RefreshTokenRecord};

mod memory;
#[cfg(feature = "keyring-store")]
mod keyring;

pub use memory::MemoryTokenStore;
#[cfg(feature = "keyring-store")]
pub use keyring::KeyringTokenStore;

/// Error type for token store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },

    /// Serialization or deserialization of a stored record failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The keyring backend is not available.
    #[error("keyring not available: {message}")]
    KeyringUnavailable { message: String },
}

/// Abstraction over per-service token storage backends.
///
/// `Ok(None)` from the getters means "no record stored", which the client
/// layer reports differently from a backend failure (`Err`).
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Retrieve the access token record for a service.
    async fn access_token(
        &self,
        service: ServiceId,
    ) -> Result<Option<AccessTokenRecord>, StoreError>;

    /// Store the access token record for a service, replacing any existing one.
    async fn set_access_token(
        &self,
        service: ServiceId,
        record: AccessTokenRecord,
    ) -> Result<(), StoreError>;

    /// Retrieve the refresh token record for a service.
    async fn refresh_token(
        &self,
        service: ServiceId,
    ) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Store the refresh token record for a service, replacing any existing one.
    async fn set_refresh_token(
        &self,
        service: ServiceId,
        record: RefreshTokenRecord,
    ) -> Result<(), StoreError>;

    /// Retrieve the signed-in user id, shared across services.
    async fn user_id(&self) -> Result<Option<String>, StoreError>;

    /// Store the signed-in user id.
    async fn set_user_id(&self, user_id: String) -> Result<(), StoreError>;

    /// Drop the access token for a service.
    ///
    /// Preserves the user id and the refresh token.
    async fn clear_session(&self, service: ServiceId) -> Result<(), StoreError>;
}
