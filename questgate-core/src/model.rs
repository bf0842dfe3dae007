//! Domain model types for questgate.
//!
//! The central type is [`ServiceId`], the identity of a backend service.
//! It keys every per-service concern in the client layer: host lookup,
//! token storage, and refresh coordination.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a backend service.
///
/// Stable for the process lifetime. Every per-service map in the client
/// layer is keyed by this enum.
///
/// # Examples
///
/// ```
/// use questgate_core::ServiceId;
///
/// assert_eq!(ServiceId::GameServer.as_str(), "game_server");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceId {
    /// The gameplay backend.
    GameServer,

    /// The authentication backend. Also the target of refresh calls.
    AuthServer,
}

impl ServiceId {
    /// All known services, for iteration.
    pub const ALL: [ServiceId; 2] = [ServiceId::GameServer, ServiceId::AuthServer];

    /// Get the service identity as a string slice.
    ///
    /// Also the `targetServer` value on the refresh wire format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GameServer => "game_server",
            Self::AuthServer => "auth_server",
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
