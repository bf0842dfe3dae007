//! Token records and expiry semantics.
//!
//! This module provides:
//! - [`AccessTokenRecord`] - A bearer access token with a unix-seconds expiry
//! - [`RefreshTokenRecord`] - An opaque refresh token with its own expiry
//!
//! Expiry uses a sentinel convention: `expires_at <= 0` means the expiry is
//! unknown (or the token never expires) and proactive expiry checks are
//! disabled. A configurable safety margin is subtracted from `expires_at`
//! before comparison, so tokens are treated as expired slightly before the
//! server would reject them.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::secret::Secret;

/// A bearer access token with its expected expiry.
///
/// Read by the client layer once per call; updated only through the
/// [`TokenStore`](crate::TokenStore) after a successful refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenRecord {
    /// The JWT access token value, sent as `Authorization: Bearer <token>`.
    pub token: Secret,

    /// Expected expiry as a unix timestamp in seconds.
    ///
    /// A value `<= 0` means unknown/never expires.
    pub expires_at: i64,
}

impl AccessTokenRecord {
    /// Create a new access token record.
    pub fn new(token: impl Into<String>, expires_at: i64) -> Self {
        Self {
            token: Secret::new(token),
            expires_at,
        }
    }

    /// Create a record whose expiry is unknown, disabling expiry checks.
    pub fn never_expiring(token: impl Into<String>) -> Self {
        Self::new(token, -1)
    }

    /// Check expiry against an explicit clock reading.
    ///
    /// `margin_secs` is subtracted from the stored expiry before the
    /// comparison. Records with the unknown-expiry sentinel are never
    /// considered expired.
    pub fn is_expired_at(&self, now: i64, margin_secs: i64) -> bool {
        self.expires_at > 0 && now >= self.expires_at - margin_secs
    }

    /// Check expiry against the current wall clock.
    pub fn is_expired(&self, margin_secs: i64) -> bool {
        self.is_expired_at(Utc::now().timestamp(), margin_secs)
    }
}

/// An opaque refresh token with its expected expiry.
///
/// Only ever consumed by the refresh call; persisted (encrypted at rest)
/// by the store backend, outside this crate's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// The opaque refresh token value.
    pub token: Secret,

    /// Expected expiry as a unix timestamp in seconds, `<= 0` if unknown.
    pub expires_at: i64,
}

impl RefreshTokenRecord {
    /// Create a new refresh token record.
    pub fn new(token: impl Into<String>, expires_at: i64) -> Self {
        Self {
            token: Secret::new(token),
            expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_within_margin() {
        // Expires in 10s, margin 30s: already treated as expired.
        let now = 1_000_000;
        let record = AccessTokenRecord::new("t", now + 10);
        assert!(record.is_expired_at(now, 30));
    }

    #[test]
    fn test_not_expired_outside_margin() {
        let now = 1_000_000;
        let record = AccessTokenRecord::new("t", now + 120);
        assert!(!record.is_expired_at(now, 30));
    }

    #[test]
    fn test_boundary_is_expired() {
        // now == expires_at - margin counts as expired.
        let now = 1_000_000;
        let record = AccessTokenRecord::new("t", now + 30);
        assert!(record.is_expired_at(now, 30));
    }

    #[test]
    fn test_sentinel_disables_expiry_check() {
        let record = AccessTokenRecord::never_expiring("t");
        assert!(!record.is_expired_at(i64::MAX, 30));

        let zero = AccessTokenRecord::new("t", 0);
        assert!(!zero.is_expired_at(i64::MAX, 30));
    }

    #[test]
    fn test_zero_margin() {
        let now = 1_000_000;
        let record = AccessTokenRecord::new("t", now);
        assert!(record.is_expired_at(now, 0));
        assert!(!record.is_expired_at(now - 1, 0));
    }
}
