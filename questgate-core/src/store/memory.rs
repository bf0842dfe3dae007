//! In-memory token storage implementation.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{StoreError, TokenStore};
use crate::model::ServiceId;
use crate::token::{AccessTokenRecord, RefreshTokenRecord};

/// In-memory token store.
///
/// The default backend and the test double. Not persistent; everything is
/// lost when the process exits.
///
/// # Thread Safety
///
/// Uses interior mutability via `RwLock` and is safe to share across tasks.
#[derive(Default)]
pub struct MemoryTokenStore {
    access: RwLock<HashMap<ServiceId, AccessTokenRecord>>,
    refresh: RwLock<HashMap<ServiceId, RefreshTokenRecord>>,
    user_id: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for MemoryTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTokenStore")
            .field("access_count", &self.access.read().len())
            .field("refresh_count", &self.refresh.read().len())
            .finish()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn access_token(
        &self,
        service: ServiceId,
    ) -> Result<Option<AccessTokenRecord>, StoreError> {
        Ok(self.access.read().get(&service).cloned())
    }

    async fn set_access_token(
        &self,
        service: ServiceId,
        record: AccessTokenRecord,
    ) -> Result<(), StoreError> {
        self.access.write().insert(service, record);
        tracing::debug!(service = %service, "access token record updated");
        Ok(())
    }

    async fn refresh_token(
        &self,
        service: ServiceId,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Ok(self.refresh.read().get(&service).cloned())
    }

    async fn set_refresh_token(
        &self,
        service: ServiceId,
        record: RefreshTokenRecord,
    ) -> Result<(), StoreError> {
        self.refresh.write().insert(service, record);
        tracing::debug!(service = %service, "refresh token record updated");
        Ok(())
    }

    async fn user_id(&self) -> Result<Option<String>, StoreError> {
        Ok(self.user_id.read().clone())
    }

    async fn set_user_id(&self, user_id: String) -> Result<(), StoreError> {
        *self.user_id.write() = Some(user_id);
        Ok(())
    }

    async fn clear_session(&self, service: ServiceId) -> Result<(), StoreError> {
        self.access.write().remove(&service);
        tracing::debug!(service = %service, "session cleared, user id preserved");
        Ok(())
    }
}
