//! GCP error types following Google Cloud API error conventions.
//!
//! Google Cloud APIs return errors in a consistent JSON format with
//! `error.code`, `error.message`, and `error.status` fields. This module
//! provides a unified error type for every snippet: API failures, transport
//! failures, long-running operations that finished with an error, and
//! failures writing the confirmation text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level error type for all GCP operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcpError {
    /// The HTTP status code (e.g., 400, 403, 404, 409, 500).
    pub code: u16,
    /// Human-readable error message.
    pub message: String,
    /// gRPC status string (e.g., "INVALID_ARGUMENT", "PERMISSION_DENIED").
    pub status: String,
    /// The GCP service that returned the error (e.g., "compute", "pubsub").
    pub service: String,
    /// The API method that failed (e.g., "CreateChannel").
    pub method: Option<String>,
    /// Whether the server reported a transient failure (429, 500, 503).
    pub retryable: bool,
}

impl fmt::Display for GcpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref method) = self.method {
            write!(f, "{}: ", method)?;
        }
        write!(
            f,
            "GCP {} error [{}]: {} (HTTP {})",
            self.service, self.status, self.message, self.code
        )
    }
}

impl std::error::Error for GcpError {}

fn is_retryable(code: u16) -> bool {
    matches!(code, 429 | 500 | 503)
}

impl GcpError {
    /// Create a new GCP error.
    pub fn new(service: &str, code: u16, status: &str, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            status: status.to_string(),
            service: service.to_string(),
            method: None,
            retryable: is_retryable(code),
        }
    }

    /// Create from a generic string error with service context.
    pub fn from_str(service: &str, msg: &str) -> Self {
        Self {
            code: 500,
            message: msg.to_string(),
            status: "INTERNAL".to_string(),
            service: service.to_string(),
            method: None,
            retryable: false,
        }
    }

    /// Authentication error.
    pub fn auth_error(msg: &str) -> Self {
        Self {
            code: 401,
            message: msg.to_string(),
            status: "UNAUTHENTICATED".to_string(),
            service: "auth".to_string(),
            method: None,
            retryable: false,
        }
    }

    /// Caller supplied a value the snippet cannot use.
    pub fn invalid_argument(service: &str, msg: &str) -> Self {
        Self::new(service, 400, "INVALID_ARGUMENT", msg)
    }

    /// A resource the snippet looked up locally was missing.
    pub fn not_found(service: &str, msg: &str) -> Self {
        Self::new(service, 404, "NOT_FOUND", msg)
    }

    /// Configuration could not be loaded or is incomplete.
    pub fn config(msg: &str) -> Self {
        Self::new("config", 400, "FAILED_PRECONDITION", msg)
    }

    /// Payload integrity check failed.
    pub fn data_loss(service: &str, msg: &str) -> Self {
        Self::new(service, 500, "DATA_LOSS", msg)
    }

    /// Receive loop or operation wait was stopped by the caller.
    pub fn cancelled(service: &str) -> Self {
        Self::new(service, 499, "CANCELLED", "operation was cancelled")
    }

    /// Parse a GCP API error from a JSON response body.
    pub fn from_api_response(service: &str, status_code: u16, body: &str) -> Self {
        // GCP APIs return: { "error": { "code": N, "message": "...", "status": "..." } }
        #[derive(Deserialize)]
        struct ApiErrorInner {
            code: Option<u16>,
            message: Option<String>,
            status: Option<String>,
        }
        #[derive(Deserialize)]
        struct ApiErrorWrapper {
            error: Option<ApiErrorInner>,
        }

        if let Ok(wrapper) = serde_json::from_str::<ApiErrorWrapper>(body) {
            if let Some(err) = wrapper.error {
                let code = err.code.unwrap_or(status_code);
                return Self {
                    code,
                    message: err.message.unwrap_or_else(|| "Unknown error".to_string()),
                    status: err.status.unwrap_or_else(|| "UNKNOWN".to_string()),
                    service: service.to_string(),
                    method: None,
                    retryable: is_retryable(code),
                };
            }
        }

        Self {
            code: status_code,
            message: if body.is_empty() {
                format!("HTTP {}", status_code)
            } else {
                body.chars().take(500).collect()
            },
            status: "UNKNOWN".to_string(),
            service: service.to_string(),
            method: None,
            retryable: is_retryable(status_code),
        }
    }

    /// Build an error from a `google.rpc.Status` carried by a finished operation.
    pub fn from_operation_status(service: &str, code: i32, message: &str) -> Self {
        // google.rpc.Code values, not HTTP codes.
        let (http, status) = match code {
            1 => (499, "CANCELLED"),
            3 => (400, "INVALID_ARGUMENT"),
            4 => (504, "DEADLINE_EXCEEDED"),
            5 => (404, "NOT_FOUND"),
            6 => (409, "ALREADY_EXISTS"),
            7 => (403, "PERMISSION_DENIED"),
            8 => (429, "RESOURCE_EXHAUSTED"),
            9 => (400, "FAILED_PRECONDITION"),
            10 => (409, "ABORTED"),
            14 => (503, "UNAVAILABLE"),
            16 => (401, "UNAUTHENTICATED"),
            _ => (500, "OPERATION_FAILED"),
        };
        Self::new(service, http, status, message)
    }

    /// Set the method that failed.
    pub fn with_method(mut self, method: &str) -> Self {
        self.method = Some(method.to_string());
        self
    }

    /// Whether the API reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        self.code == 404
    }
}

/// Writing the confirmation text failed.
impl From<std::io::Error> for GcpError {
    fn from(e: std::io::Error) -> Self {
        Self::from_str("io", &format!("write output: {}", e))
    }
}

/// Serializing a value for output failed.
impl From<serde_json::Error> for GcpError {
    fn from(e: serde_json::Error) -> Self {
        Self::from_str("json", &format!("serialize output: {}", e))
    }
}

/// Convenience type alias for GCP results.
pub type GcpResult<T> = Result<T, GcpError>;

/// Tag the error side of a result with the API method that produced it.
pub trait Context<T> {
    fn context(self, method: &str) -> GcpResult<T>;
}

impl<T> Context<T> for GcpResult<T> {
    fn context(self, method: &str) -> GcpResult<T> {
        self.map_err(|e| e.with_method(method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_api_error_body() {
        let body = r#"{"error":{"code":404,"message":"Secret [s] not found","status":"NOT_FOUND"}}"#;
        let err = GcpError::from_api_response("secretmanager", 404, body);
        assert_eq!(err.code, 404);
        assert_eq!(err.status, "NOT_FOUND");
        assert_eq!(err.message, "Secret [s] not found");
        assert!(err.is_not_found());
        assert!(!err.retryable);
    }

    #[test]
    fn falls_back_to_raw_body() {
        let err = GcpError::from_api_response("pubsub", 503, "upstream connect error");
        assert_eq!(err.status, "UNKNOWN");
        assert_eq!(err.message, "upstream connect error");
        assert!(err.retryable);

        let empty = GcpError::from_api_response("pubsub", 502, "");
        assert_eq!(empty.message, "HTTP 502");
    }

    #[test]
    fn context_prefixes_display() {
        let res: GcpResult<()> = Err(GcpError::new("livestream", 409, "ALREADY_EXISTS", "exists"));
        let err = res.context("CreateChannel").unwrap_err();
        assert_eq!(err.method.as_deref(), Some("CreateChannel"));
        assert!(err.to_string().starts_with("CreateChannel: GCP livestream error [ALREADY_EXISTS]"));
    }

    #[test]
    fn json_errors_convert() {
        let bad = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: GcpError = bad.into();
        assert_eq!(err.service, "json");
        assert_eq!(err.status, "INTERNAL");
        assert!(err.message.starts_with("serialize output: "));
    }

    #[test]
    fn maps_rpc_codes() {
        let err = GcpError::from_operation_status("compute", 5, "gone");
        assert_eq!(err.code, 404);
        assert_eq!(err.status, "NOT_FOUND");
        let other = GcpError::from_operation_status("compute", 13, "boom");
        assert_eq!(other.status, "OPERATION_FAILED");
    }
}
