//! # Questgate Client
//!
//! Authenticated HTTP client layer for game backend services.
//!
//! This crate provides:
//! - [`HttpJob`] - One logical HTTP call with bounded retries and a
//!   per-attempt timeout
//! - [`JobProcessor`] - Builds final URLs and launches jobs
//! - [`ApiClient`] - The orchestrator: resolves hosts and tokens, detects
//!   authorization failures, and coordinates per-service single-flight
//!   token refresh so concurrent callers never trigger redundant refresh
//!   calls
//!
//! All failures are delivered through the same [`ApiResponse`] channel as
//! successes, as a JSON envelope with a machine-readable code and a
//! human-readable message.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use questgate_client::{ApiClient, ApiRequest};
//! use questgate_core::{ClientConfig, MemoryTokenStore, ServiceId, StaticHostResolver};
//!
//! # async fn example() {
//! let hosts = StaticHostResolver::new()
//!     .with_host(ServiceId::GameServer, "http://localhost:8080");
//! let tokens = Arc::new(MemoryTokenStore::new());
//! let client = ApiClient::new(Arc::new(hosts), tokens, ClientConfig::default());
//!
//! let response = client
//!     .call(ApiRequest::get(ServiceId::GameServer, "/health/login"))
//!     .await;
//! println!("{}: {}", response.status, response.body);
//! # }
//! ```

pub mod api;
pub mod job;
pub mod processor;
pub mod response;

mod coordinator;
mod refresh;

// Re-export commonly used types at crate root
pub use api::{
    ApiClient,
    ApiRequest,
};

pub use job::{
    HttpJob,
    HttpMethod,
    JobError,
    JobOutcome,
};

pub use processor::{
    JobHandle,
    JobProcessor,
};

pub use response::{
    ApiEnvelope,
    ApiResponse,
    ErrorCode,
};
