//! Response classification and the uniform envelope.
//!
//! Every failure in the client layer is delivered through the same channel
//! as success: an [`ApiResponse`] whose body is either the server's raw
//! payload (2xx) or a synthetic `{"success": false, "code": ..,
//! "message": ..}` envelope. Callers keep one response-handling path
//! regardless of where a failure originated.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::job::JobOutcome;

/// Machine-readable failure codes surfaced by the client layer itself.
///
/// HTTP-status-derived codes (`BAD_REQUEST`, `UNAUTHORIZED`, ...) are
/// produced by classification and not enumerated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// No host mapping configured for the service.
    HostNotFound,
    /// No access token stored for the service.
    TokenNotFound,
    /// The token store itself is unavailable.
    ProviderNotFound,
    /// The token store failed during the refresh flow.
    IdentityProviderNotFound,
    /// No refresh token stored for the service.
    RefreshTokenNotFound,
    /// A response body could not be parsed as JSON.
    JsonParseError,
    /// The auth server rejected the refresh.
    TokenRefreshFailed,
    /// The request never reached the server.
    NetworkError,
    /// Anything the classifier has no name for.
    UnknownError,
}

impl ErrorCode {
    /// Get the code as its wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HostNotFound => "HOST_NOT_FOUND",
            Self::TokenNotFound => "TOKEN_NOT_FOUND",
            Self::ProviderNotFound => "PROVIDER_NOT_FOUND",
            Self::IdentityProviderNotFound => "IDENTITY_PROVIDER_NOT_FOUND",
            Self::RefreshTokenNotFound => "REFRESH_TOKEN_NOT_FOUND",
            Self::JsonParseError => "JSON_PARSE_ERROR",
            Self::TokenRefreshFailed => "TOKEN_REFRESH_FAILED",
            Self::NetworkError => "NETWORK_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The standard response envelope shared by the backend services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiEnvelope {
    /// Whether the business operation succeeded.
    pub success: bool,

    /// Machine-readable code for network, parsing, or business state.
    pub code: String,

    /// Human-readable message; presentation-layer translation happens
    /// elsewhere.
    pub message: String,
}

impl Default for ApiEnvelope {
    fn default() -> Self {
        Self {
            success: false,
            code: ErrorCode::UnknownError.as_str().to_string(),
            message: "There is an unknown error".to_string(),
        }
    }
}

/// Result of one logical API call, success or failure.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code; `0` when no network call produced one.
    pub status: u16,

    /// Whether the request reached the server.
    pub network_ok: bool,

    /// Raw body for 2xx responses, a synthetic envelope otherwise.
    pub body: String,
}

impl ApiResponse {
    /// Whether this is a 2xx response that reached the server.
    pub fn is_success(&self) -> bool {
        self.network_ok && self.status >= 200 && self.status < 300
    }

    /// Parse the body into a typed value.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    /// Parse the body as the standard envelope, substituting a
    /// `JSON_PARSE_ERROR` envelope when the body is not valid JSON.
    pub fn envelope(&self) -> ApiEnvelope {
        self.parse().unwrap_or_else(|_| ApiEnvelope {
            success: false,
            code: ErrorCode::JsonParseError.as_str().to_string(),
            message: "Failed to parse JSON response body".to_string(),
        })
    }

    /// A terminal failure that never produced a network response.
    pub(crate) fn failure(code: &str, message: &str) -> Self {
        Self {
            status: 0,
            network_ok: false,
            body: synthetic_body(code, message),
        }
    }
}

/// Build the synthetic failure envelope body.
pub(crate) fn synthetic_body(code: &str, message: &str) -> String {
    serde_json::json!({
        "success": false,
        "code": code,
        "message": message,
    })
    .to_string()
}

/// Status-derived code and message for non-2xx responses.
fn status_label(status: u16) -> (&'static str, &'static str) {
    match status {
        400 => ("BAD_REQUEST", "Bad Request"),
        401 => ("UNAUTHORIZED", "Unauthorized"),
        402 => ("PAYMENT_REQUIRED", "Payment Required"),
        403 => ("FORBIDDEN", "Forbidden"),
        404 => ("NOT_FOUND", "Not Found"),
        405 => ("METHOD_NOT_ALLOWED", "Method Not Allowed"),
        406 => ("NOT_ACCEPTABLE", "Not Acceptable"),
        407 => ("PROXY_AUTH_REQUIRED", "Proxy Authentication Required"),
        408 => ("REQUEST_TIMEOUT", "Request Timeout"),
        500 => ("INTERNAL_SERVER_ERROR", "Internal Server Error"),
        501 => ("NOT_IMPLEMENTED", "Not Implemented"),
        502 => ("BAD_GATEWAY", "Bad Gateway"),
        503 => ("SERVICE_UNAVAILABLE", "Service Unavailable"),
        504 => ("GATEWAY_TIMEOUT", "Gateway Timeout"),
        _ => ("UNKNOWN_ERROR", "Unknown Error"),
    }
}

/// Turn a job outcome into the uniform response shape.
///
/// Network failures and timeouts become a `NETWORK_ERROR` envelope; 2xx
/// bodies pass through untouched; every other status gets the
/// status-derived envelope while keeping the real status code.
pub(crate) fn classify(outcome: &JobOutcome) -> ApiResponse {
    if !outcome.network_ok {
        return ApiResponse {
            status: outcome.status,
            network_ok: false,
            body: synthetic_body(
                ErrorCode::NetworkError.as_str(),
                "Failed to send HTTP request",
            ),
        };
    }

    if outcome.status >= 200 && outcome.status < 300 {
        return ApiResponse {
            status: outcome.status,
            network_ok: true,
            body: outcome.body.clone(),
        };
    }

    let (code, message) = status_label(outcome.status);
    ApiResponse {
        status: outcome.status,
        network_ok: true,
        body: synthetic_body(code, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(network_ok: bool, status: u16, body: &str) -> JobOutcome {
        JobOutcome {
            network_ok,
            status,
            body: body.to_string(),
            attempts: 1,
        }
    }

    #[test]
    fn test_classify_success_passes_body_through() {
        let response = classify(&outcome(true, 200, r#"{"success": true}"#));
        assert!(response.is_success());
        assert_eq!(response.body, r#"{"success": true}"#);
    }

    #[test]
    fn test_classify_network_failure() {
        let response = classify(&outcome(false, 0, ""));
        assert!(!response.is_success());
        let envelope = response.envelope();
        assert!(!envelope.success);
        assert_eq!(envelope.code, "NETWORK_ERROR");
    }

    #[test]
    fn test_classify_timeout_keeps_status() {
        let response = classify(&outcome(false, 408, TIMEOUT_PLACEHOLDER));
        assert_eq!(response.status, 408);
        assert!(!response.network_ok);
        assert_eq!(response.envelope().code, "NETWORK_ERROR");
    }

    const TIMEOUT_PLACEHOLDER: &str = r#"{"message": "timed out"}"#;

    #[test]
    fn test_classify_known_status() {
        let response = classify(&outcome(true, 404, "ignored"));
        let envelope = response.envelope();
        assert_eq!(envelope.code, "NOT_FOUND");
        assert_eq!(envelope.message, "Not Found");
        assert_eq!(response.status, 404);
    }

    #[test]
    fn test_classify_unknown_status() {
        let response = classify(&outcome(true, 418, ""));
        assert_eq!(response.envelope().code, "UNKNOWN_ERROR");
    }

    #[test]
    fn test_envelope_of_unparseable_body() {
        let response = ApiResponse {
            status: 200,
            network_ok: true,
            body: "not json".to_string(),
        };
        let envelope = response.envelope();
        assert!(!envelope.success);
        assert_eq!(envelope.code, "JSON_PARSE_ERROR");
    }

    #[test]
    fn test_envelope_fills_missing_fields_with_defaults() {
        let response = ApiResponse {
            status: 200,
            network_ok: true,
            body: r#"{"success": true}"#.to_string(),
        };
        let envelope = response.envelope();
        assert!(envelope.success);
        assert_eq!(envelope.code, "UNKNOWN_ERROR");
    }

    #[test]
    fn test_failure_constructor() {
        let response = ApiResponse::failure("HOST_NOT_FOUND", "no host");
        assert_eq!(response.status, 0);
        assert!(!response.network_ok);
        let envelope = response.envelope();
        assert_eq!(envelope.code, "HOST_NOT_FOUND");
        assert_eq!(envelope.message, "no host");
    }
}
