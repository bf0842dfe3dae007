//! Host resolution for backend services.
//!
//! Maps a [`ServiceId`] to the base URL its REST endpoints hang off of.
//! Host strings are not validated here; the resolver only answers "is a
//! mapping configured".

use std::collections::HashMap;

use crate::config::HostsConfig;
use crate::model::ServiceId;

/// Seam between the client layer and host configuration.
pub trait HostResolver: Send + Sync {
    /// Get the base URL for a service.
    ///
    /// Returns `None` when no mapping is configured. The content of a
    /// configured host is not validated.
    fn host(&self, service: ServiceId) -> Option<String>;
}

/// Host resolver backed by a fixed map, typically loaded from config.
#[derive(Debug, Default, Clone)]
pub struct StaticHostResolver {
    hosts: HashMap<ServiceId, String>,
}

impl StaticHostResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a host mapping.
    pub fn with_host(mut self, service: ServiceId, host: impl Into<String>) -> Self {
        self.hosts.insert(service, host.into());
        self
    }

    /// Build a resolver from the hosts section of the client config.
    pub fn from_config(config: &HostsConfig) -> Self {
        let mut resolver = Self::new();
        if let Some(host) = &config.game_server {
            resolver = resolver.with_host(ServiceId::GameServer, host.clone());
        }
        if let Some(host) = &config.auth_server {
            resolver = resolver.with_host(ServiceId::AuthServer, host.clone());
        }
        resolver
    }
}

impl HostResolver for StaticHostResolver {
    fn host(&self, service: ServiceId) -> Option<String> {
        let host = self.hosts.get(&service)?;
        if host.is_empty() {
            // Configured but empty is still a mapping; the caller decides
            // what to do with it.
            tracing::warn!(service = %service, "configured host is empty");
        }
        Some(host.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_configured_host() {
        let resolver =
            StaticHostResolver::new().with_host(ServiceId::GameServer, "http://game.local:8080");
        assert_eq!(
            resolver.host(ServiceId::GameServer).as_deref(),
            Some("http://game.local:8080")
        );
    }

    #[test]
    fn test_missing_mapping_is_none() {
        let resolver = StaticHostResolver::new();
        assert!(resolver.host(ServiceId::AuthServer).is_none());
    }

    #[test]
    fn test_empty_host_is_still_a_mapping() {
        let resolver = StaticHostResolver::new().with_host(ServiceId::AuthServer, "");
        assert_eq!(resolver.host(ServiceId::AuthServer).as_deref(), Some(""));
    }

    #[test]
    fn test_from_config() {
        let config = HostsConfig {
            game_server: Some("http://game".to_string()),
            auth_server: None,
        };
        let resolver = StaticHostResolver::from_config(&config);
        assert!(resolver.host(ServiceId::GameServer).is_some());
        assert!(resolver.host(ServiceId::AuthServer).is_none());
    }
}
