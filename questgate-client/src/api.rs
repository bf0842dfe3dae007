//! The authenticated call orchestrator.
//!
//! [`ApiClient`] ties the layer together: it resolves the host and the
//! access token, decides whether a call can proceed immediately or must
//! park behind the service's refresh lane, executes through the
//! [`JobProcessor`](crate::JobProcessor), and watches the completion path
//! for authorization failures.
//!
//! A 401 is never surfaced directly to the caller: the already-built
//! request parks behind a refresh and is replayed once with the new token.
//! The replay has refresh handling disabled, so a second 401 after a
//! successful refresh comes back as a normal failure response and the loop
//! terminates.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use questgate_core::{ClientConfig, HostResolver, RefreshConfig, Secret, ServiceId, TokenStore};

use crate::coordinator::{Admission, RefreshCoordinator};
use crate::job::HttpMethod;
use crate::processor::JobProcessor;
use crate::refresh::RefreshRunner;
use crate::response::{classify, ApiEnvelope, ApiResponse, ErrorCode};

/// One logical REST call against a backend service.
///
/// Built with the constructor shortcuts and chained setters:
///
/// ```rust
/// use questgate_client::ApiRequest;
/// use questgate_core::ServiceId;
///
/// let request = ApiRequest::get(ServiceId::GameServer, "/match/history")
///     .query("page", "2")
///     .require_auth(true);
/// ```
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub service: ServiceId,
    pub method: HttpMethod,
    pub endpoint: String,

    /// JSON body, empty for body-less calls.
    pub body: String,

    /// Query parameters, percent-encoded at submission.
    pub query: HashMap<String, String>,

    /// When `false`, the call skips the token lookup entirely and a 401
    /// from the server is reported as-is instead of triggering a refresh.
    pub requires_auth: bool,

    /// Optional channel receiving the upcoming attempt number before each
    /// retry.
    pub retry_notify: Option<mpsc::UnboundedSender<u32>>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, service: ServiceId, endpoint: impl Into<String>) -> Self {
        Self {
            service,
            method,
            endpoint: endpoint.into(),
            body: String::new(),
            query: HashMap::new(),
            requires_auth: true,
            retry_notify: None,
        }
    }

    pub fn get(service: ServiceId, endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, service, endpoint)
    }

    pub fn post(service: ServiceId, endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, service, endpoint)
    }

    pub fn put(service: ServiceId, endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, service, endpoint)
    }

    pub fn delete(service: ServiceId, endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, service, endpoint)
    }

    /// Set the JSON body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Toggle authentication for this call. Defaults to `true`.
    pub fn require_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }

    /// Receive retry notifications for this call.
    pub fn retry_notify(mut self, sender: mpsc::UnboundedSender<u32>) -> Self {
        self.retry_notify = Some(sender);
        self
    }
}

struct ApiClientInner {
    hosts: Arc<dyn HostResolver>,
    tokens: Arc<dyn TokenStore>,
    processor: JobProcessor,
    coordinator: RefreshCoordinator,
    refresh: RefreshConfig,
}

/// The orchestrator for authenticated REST calls.
///
/// Collaborators are constructor-injected; one instance per session owns
/// its refresh state, and clones share it.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

impl ApiClient {
    /// Create a client with its own HTTP connection pool.
    pub fn new(
        hosts: Arc<dyn HostResolver>,
        tokens: Arc<dyn TokenStore>,
        config: ClientConfig,
    ) -> Self {
        Self::with_http_client(reqwest::Client::new(), hosts, tokens, config)
    }

    /// Create a client sharing an existing `reqwest` client.
    pub fn with_http_client(
        client: reqwest::Client,
        hosts: Arc<dyn HostResolver>,
        tokens: Arc<dyn TokenStore>,
        config: ClientConfig,
    ) -> Self {
        let processor = JobProcessor::with_client(client, config.request.clone());
        let runner = RefreshRunner::new(
            Arc::clone(&hosts),
            Arc::clone(&tokens),
            processor.clone(),
            config.refresh.clone(),
        );
        let coordinator = RefreshCoordinator::new(Arc::new(runner));

        Self {
            inner: Arc::new(ApiClientInner {
                hosts,
                tokens,
                processor,
                coordinator,
                refresh: config.refresh,
            }),
        }
    }

    /// Issue one call and deliver the uniform response shape.
    ///
    /// All failures come back through the same channel as success; see
    /// [`ApiResponse::envelope`] for the machine-readable code.
    pub async fn call(&self, request: ApiRequest) -> ApiResponse {
        let Some(host) = self.inner.hosts.host(request.service) else {
            warn!(service = %request.service, "failed to resolve host");
            return ApiResponse::failure(
                ErrorCode::HostNotFound.as_str(),
                "Failed to resolve a host for the service",
            );
        };
        let url = format!("{}{}", host, request.endpoint);

        if !request.requires_auth {
            // No token lookup and no 401 handling; the flag gates both.
            return self.execute(&request, &url, None).await;
        }

        let record = match self.inner.tokens.access_token(request.service).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(service = %request.service, "no access token stored");
                return ApiResponse::failure(
                    ErrorCode::TokenNotFound.as_str(),
                    "Failed to get an access token for the service",
                );
            }
            Err(err) => {
                warn!(service = %request.service, error = %err, "token store unavailable");
                return ApiResponse::failure(
                    ErrorCode::ProviderNotFound.as_str(),
                    "Token store is unavailable",
                );
            }
        };

        let expired = record.is_expired_at(
            Utc::now().timestamp(),
            self.inner.refresh.expiry_margin_secs,
        );
        if expired {
            debug!(service = %request.service, "access token expired or expiring, parking call behind refresh");
        }

        match self.inner.coordinator.admit(request.service, expired).await {
            Admission::Proceed => {}
            Admission::TokenReady(token) => {
                // Queued behind a refresh; replay with the fresh token and
                // refresh handling disabled.
                return self.execute(&request, &url, Some(Secret::new(token))).await;
            }
            Admission::TokenFailed { code, message } => {
                return ApiResponse::failure(&code, &message);
            }
        }

        let response = self.execute(&request, &url, Some(record.token.clone())).await;

        if response.network_ok && response.status == 401 {
            info!(service = %request.service, "401 received, parking replay behind a token refresh");
            return match self.inner.coordinator.admit(request.service, true).await {
                Admission::TokenReady(token) => {
                    self.execute(&request, &url, Some(Secret::new(token))).await
                }
                Admission::TokenFailed { code, message } => {
                    ApiResponse::failure(&code, &message)
                }
                // admit with expired=true always parks; fall back to the
                // classified 401 rather than loop.
                Admission::Proceed => response,
            };
        }

        response
    }

    /// Issue one call and parse the body into a typed value.
    ///
    /// On any failure, including a body that does not parse as `T`, the
    /// error side carries the standard envelope so callers keep one
    /// handling path.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, ApiEnvelope> {
        let response = self.call(request).await;
        match response.parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => Err(response.envelope()),
        }
    }

    async fn execute(
        &self,
        request: &ApiRequest,
        url: &str,
        token: Option<Secret>,
    ) -> ApiResponse {
        let handle = self.inner.processor.submit(
            request.method,
            url,
            token,
            request.body.clone(),
            &request.query,
            None,
            request.retry_notify.clone(),
        );
        match handle.outcome().await {
            Some(outcome) => classify(&outcome),
            None => ApiResponse::failure(
                ErrorCode::NetworkError.as_str(),
                "Request was cancelled before completion",
            ),
        }
    }
}
