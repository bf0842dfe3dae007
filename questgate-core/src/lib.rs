//! # Questgate Core
//!
//! Core library for the questgate authenticated API client layer.
//!
//! This crate provides:
//! - The [`ServiceId`] identity used to key host lookup, token storage,
//!   and refresh coordination
//! - Token records with expiry-margin semantics and the [`TokenStore`] trait
//! - In-memory and (optionally) keyring-based token storage backends
//! - The [`HostResolver`] seam mapping a service to its base URL
//! - Request/refresh policy configuration with TOML file loading
//!
//! ## Quick Start
//!
//! ```rust
//! use questgate_core::{MemoryTokenStore, ServiceId, AccessTokenRecord, TokenStore};
//!
//! # async fn example() -> Result<(), questgate_core::StoreError> {
//! let store = MemoryTokenStore::new();
//! store
//!     .set_access_token(ServiceId::GameServer, AccessTokenRecord::new("jwt", 9999999999))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod host;
pub mod model;
pub mod secret;
pub mod store;
pub mod token;

// Re-export commonly used types at crate root
pub use model::ServiceId;

pub use secret::Secret;

pub use token::{
    AccessTokenRecord,
    RefreshTokenRecord,
};

pub use store::{
    MemoryTokenStore,
    StoreError,
    TokenStore,
};

#[cfg(feature = "keyring-store")]
pub use store::KeyringTokenStore;

pub use host::{
    HostResolver,
    StaticHostResolver,
};

pub use config::{
    ClientConfig,
    HostsConfig,
    RefreshConfig,
    RequestConfig,
    load_config,
    load_config_from,
};
