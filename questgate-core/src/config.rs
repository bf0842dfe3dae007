//! Client configuration handling.
//!
//! Policy knobs for the request machinery (retries, timeouts) and the
//! refresh flow (expiry margin, degraded-mode auth URL), plus the host
//! table, loadable from a `questgate.toml` file.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Per-request retry and timeout policy.
///
/// Immutable per job; a job snapshot takes effect at `execute()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Maximum total attempts. `1` means a single attempt with no retry.
    /// Values below 1 are treated as 1.
    pub max_retries: u32,

    /// Fixed wait between attempts, in seconds. Not exponential.
    pub retry_delay_secs: f32,

    /// Per-attempt timeout, in seconds.
    pub timeout_secs: f32,

    /// Retry when the server answers with a 5xx status.
    pub retry_on_5xx: bool,

    /// Retry when an attempt times out.
    pub retry_on_timeout: bool,

    /// Retry when the request never reaches the server.
    pub retry_on_network_error: bool,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_secs: 1.0,
            timeout_secs: 30.0,
            retry_on_5xx: true,
            retry_on_timeout: true,
            retry_on_network_error: true,
        }
    }
}

impl RequestConfig {
    /// The retry delay as a [`Duration`]. Negative values clamp to zero.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs_f32(self.retry_delay_secs.max(0.0))
    }

    /// The per-attempt timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f32(self.timeout_secs.max(0.0))
    }
}

/// Policy for the token refresh flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Safety margin subtracted from a token's expiry before comparing
    /// against the clock, in seconds.
    pub expiry_margin_secs: i64,

    /// Base URL used for the refresh call when the auth server host cannot
    /// be resolved. Degraded-mode default, never silently dropped.
    pub fallback_auth_url: String,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            expiry_margin_secs: 30,
            fallback_auth_url: "http://localhost:5000".to_string(),
        }
    }
}

/// Base URLs for the backend services.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostsConfig {
    /// Base URL of the game server.
    pub game_server: Option<String>,

    /// Base URL of the auth server.
    pub auth_server: Option<String>,
}

/// Full client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Host table.
    pub hosts: HostsConfig,

    /// Default request policy.
    pub request: RequestConfig,

    /// Refresh policy.
    pub refresh: RefreshConfig,
}

/// Load configuration from the default location or fall back to defaults.
///
/// Looks for `questgate.toml` in the platform config directory.
pub fn load_config() -> Result<ClientConfig> {
    let config_path = ProjectDirs::from("com", "questgate", "questgate")
        .map(|d| d.config_dir().join("questgate.toml"));

    match config_path {
        Some(path) if path.exists() => load_config_from(&path),
        _ => Ok(ClientConfig::default()),
    }
}

/// Load configuration from an explicit path.
pub fn load_config_from(path: &Path) -> Result<ClientConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {:?}", path))?;
    toml::from_str(&contents).with_context(|| format!("Failed to parse config from {:?}", path))
}
