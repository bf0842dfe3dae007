//! Token refresh execution and its wire format.
//!
//! One refresh is a POST to `<auth host>/auth/refresh` carrying the user
//! id, the target service name, and the stored refresh token. A successful
//! response replaces the stored access and refresh records (and the user id
//! when the server returns one) before the new access token is handed to
//! the coordinator for the queue drain.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use questgate_core::{
    AccessTokenRecord, HostResolver, RefreshConfig, RefreshTokenRecord, ServiceId, StoreError,
    TokenStore,
};

use crate::job::HttpMethod;
use crate::processor::JobProcessor;
use crate::response::{classify, ErrorCode};

/// Request body of the refresh endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    user_id: String,
    target_server: String,
    refresh_token: String,
}

/// Response body of the refresh endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RefreshResponse {
    success: bool,
    access_token: String,
    expires_at: i64,
    refresh_token: String,
    refresh_token_expires_at: i64,
    user_id: String,
    code: String,
    message: String,
}

/// Why a refresh cycle failed. Delivered uniformly to every queued caller.
#[derive(Debug, Clone)]
pub(crate) struct RefreshFailure {
    pub code: String,
    pub message: String,
}

impl RefreshFailure {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// One refresh execution against the auth server.
///
/// Seam for the coordinator; mocked in its tests.
#[async_trait]
pub(crate) trait RefreshTokens: Send + Sync {
    /// Obtain and persist a fresh access token for the service.
    async fn refresh(&self, service: ServiceId) -> Result<String, RefreshFailure>;
}

/// The production refresh path: reads the refresh token from the store,
/// POSTs through the job machinery, and persists the returned records.
pub(crate) struct RefreshRunner {
    hosts: Arc<dyn HostResolver>,
    tokens: Arc<dyn TokenStore>,
    processor: JobProcessor,
    config: RefreshConfig,
}

impl RefreshRunner {
    pub fn new(
        hosts: Arc<dyn HostResolver>,
        tokens: Arc<dyn TokenStore>,
        processor: JobProcessor,
        config: RefreshConfig,
    ) -> Self {
        Self {
            hosts,
            tokens,
            processor,
            config,
        }
    }

    fn refresh_url(&self) -> String {
        match self.hosts.host(ServiceId::AuthServer) {
            Some(host) => format!("{}/auth/refresh", host),
            None => {
                warn!("auth server host not configured, using fallback refresh URL");
                format!("{}/auth/refresh", self.config.fallback_auth_url)
            }
        }
    }

    async fn persist(&self, service: ServiceId, parsed: &RefreshResponse) -> Result<(), StoreError> {
        self.tokens
            .set_access_token(
                service,
                AccessTokenRecord::new(parsed.access_token.clone(), parsed.expires_at),
            )
            .await?;
        if !parsed.refresh_token.is_empty() {
            self.tokens
                .set_refresh_token(
                    service,
                    RefreshTokenRecord::new(
                        parsed.refresh_token.clone(),
                        parsed.refresh_token_expires_at,
                    ),
                )
                .await?;
        }
        if !parsed.user_id.is_empty() {
            self.tokens.set_user_id(parsed.user_id.clone()).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl RefreshTokens for RefreshRunner {
    async fn refresh(&self, service: ServiceId) -> Result<String, RefreshFailure> {
        let user_id = match self.tokens.user_id().await {
            Ok(id) => id.unwrap_or_default(),
            Err(err) => {
                return Err(RefreshFailure::new(
                    ErrorCode::IdentityProviderNotFound.as_str(),
                    format!("token store unavailable: {}", err),
                ));
            }
        };

        let refresh_record = match self.tokens.refresh_token(service).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                return Err(RefreshFailure::new(
                    ErrorCode::RefreshTokenNotFound.as_str(),
                    "No refresh token stored for the service",
                ));
            }
            Err(err) => {
                return Err(RefreshFailure::new(
                    ErrorCode::IdentityProviderNotFound.as_str(),
                    format!("token store unavailable: {}", err),
                ));
            }
        };

        let request = RefreshRequest {
            user_id,
            target_server: service.as_str().to_string(),
            refresh_token: refresh_record.token.expose().to_string(),
        };
        let body = match serde_json::to_string(&request) {
            Ok(body) => body,
            Err(err) => {
                return Err(RefreshFailure::new(
                    ErrorCode::JsonParseError.as_str(),
                    format!("failed to serialize refresh request: {}", err),
                ));
            }
        };

        let url = self.refresh_url();
        info!(service = %service, url = %url, "issuing token refresh");

        let handle = self
            .processor
            .submit(HttpMethod::Post, &url, None, body, &HashMap::new(), None, None);
        let Some(outcome) = handle.outcome().await else {
            return Err(RefreshFailure::new(
                ErrorCode::NetworkError.as_str(),
                "Refresh request did not complete",
            ));
        };

        // Non-2xx and transport failures come back as the synthetic
        // envelope, which parses below with success=false and the derived
        // code, so every failure shape funnels into one branch.
        let response = classify(&outcome);
        let parsed = match response.parse::<RefreshResponse>() {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(service = %service, error = %err, "refresh response body did not parse");
                return Err(RefreshFailure::new(
                    ErrorCode::JsonParseError.as_str(),
                    "Failed to parse refresh response body",
                ));
            }
        };

        if !parsed.success || parsed.access_token.is_empty() {
            let code = if parsed.code.is_empty() {
                ErrorCode::TokenRefreshFailed.as_str().to_string()
            } else {
                parsed.code
            };
            let message = if parsed.message.is_empty() {
                "Token refresh rejected by the auth server".to_string()
            } else {
                parsed.message
            };
            warn!(service = %service, code = %code, "token refresh failed");
            return Err(RefreshFailure { code, message });
        }

        if let Err(err) = self.persist(service, &parsed).await {
            return Err(RefreshFailure::new(
                ErrorCode::IdentityProviderNotFound.as_str(),
                format!("failed to persist refreshed tokens: {}", err),
            ));
        }

        info!(service = %service, "token refresh succeeded");
        Ok(parsed.access_token)
    }
}
