//! Typed error hierarchy for the azure-api-client crate.
//!
//! Callers see two kinds of failure:
//! - **Mapping errors** (`AzureApiError::Mapping`): the server answered with
//!   2xx but the body did not carry the fields the response model requires.
//!   These are contract violations and are never retried.
//! - **Client errors** (every other variant): the HTTP exchange itself failed
//!   after the retry budget was spent, the marketplace rejected a request, or
//!   the client was misconfigured.
//!
//! `Api` deliberately renders like the messages Azure SDK users are used to
//! seeing from other clients: ``Server error: `GET <url>` resulted in a
//! `500 Internal Server Error` response``, followed by the body when present.

use reqwest::{Method, StatusCode};

use crate::usage::UsageEventError;

/// Unified error type for all azure-api-client operations.
#[derive(Debug, thiserror::Error)]
pub enum AzureApiError {
    /// A response body could not be mapped into its response model.
    ///
    /// The message names the offending key and, where feasible, includes the
    /// compact JSON payload that was being mapped.
    #[error("Failed to map response data: {0}")]
    Mapping(String),

    /// The server answered with a non-success HTTP status after all retries.
    #[error(
        "{}: `{method} {url}` resulted in a `{status}` response{}",
        status_class(.status),
        body_suffix(.body)
    )]
    Api {
        /// HTTP method of the failing request.
        method: Method,
        /// Full URL of the failing request, including the query string.
        url: String,
        /// Status of the final response.
        status: StatusCode,
        /// Raw body of the final response, empty if it could not be read.
        body: String,
    },

    /// The request never produced a response (DNS, connect, TLS, timeout).
    #[error("Network error: `{method} {url}`: {source}")]
    Network {
        /// HTTP method of the failing request.
        method: Method,
        /// Full URL of the failing request.
        url: String,
        /// The transport failure reported by reqwest.
        #[source]
        source: reqwest::Error,
    },

    /// Adds operation context on top of a lower-level failure.
    #[error("{message}: {source}")]
    Client {
        /// What the caller was trying to do.
        message: String,
        /// The failure that caused it.
        #[source]
        source: Box<AzureApiError>,
    },

    /// The marketplace metering API rejected a usage event with a typed error body.
    #[error("Usage event rejected ({status}): {} - {}", .error.code, .error.message)]
    UsageEvent {
        /// Status of the rejection (400 or 409).
        status: StatusCode,
        /// The mapped error payload.
        error: UsageEventError,
    },

    /// The client was constructed with unusable settings.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AzureApiError {
    /// Wraps `self` with a context message.
    pub fn context(self, message: impl Into<String>) -> Self {
        AzureApiError::Client {
            message: message.into(),
            source: Box::new(self),
        }
    }

    /// Returns `true` for response-mapping failures, `false` for client and
    /// transport failures.
    pub fn is_mapping(&self) -> bool {
        match self {
            AzureApiError::Mapping(_) => true,
            AzureApiError::Client { source, .. } => source.is_mapping(),
            _ => false,
        }
    }

    /// Returns the HTTP status carried by this error or the error it wraps.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            AzureApiError::Api { status, .. } | AzureApiError::UsageEvent { status, .. } => {
                Some(*status)
            }
            AzureApiError::Network { source, .. } => source.status(),
            AzureApiError::Client { source, .. } => source.status(),
            _ => None,
        }
    }
}

fn status_class(status: &StatusCode) -> &'static str {
    if status.is_server_error() {
        "Server error"
    } else if status.is_client_error() {
        "Client error"
    } else {
        "Unsuccessful response"
    }
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(":\n{body}")
    }
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, AzureApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn server_error() -> AzureApiError {
        AzureApiError::Api {
            method: Method::GET,
            url: "http://169.254.169.254/metadata?api-version=2019-11-01&format=text".to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: String::new(),
        }
    }

    #[test]
    fn mapping_error_has_prefix() {
        let err = AzureApiError::Mapping(r#"Missing or invalid "id" in response: {}"#.to_string());
        assert_eq!(
            err.to_string(),
            r#"Failed to map response data: Missing or invalid "id" in response: {}"#
        );
        assert!(err.is_mapping());
    }

    #[test]
    fn api_error_renders_method_url_and_status() {
        let msg = server_error().to_string();
        assert_eq!(
            msg,
            "Server error: `GET http://169.254.169.254/metadata?api-version=2019-11-01&format=text` \
             resulted in a `500 Internal Server Error` response"
        );
    }

    #[test]
    fn api_error_appends_body_and_classifies_4xx() {
        let err = AzureApiError::Api {
            method: Method::POST,
            url: "https://marketplaceapi.microsoft.com/api/usageEvent".to_string(),
            status: StatusCode::FORBIDDEN,
            body: r#"{"error":"denied"}"#.to_string(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Client error: `POST "), "{msg}");
        assert!(msg.ends_with(":\n{\"error\":\"denied\"}"), "{msg}");
        assert!(!err.is_mapping());
    }

    #[test]
    fn context_wraps_and_chains_source() {
        let err = server_error().context("Instance metadata service not available");
        let msg = err.to_string();
        assert!(msg.starts_with("Instance metadata service not available: Server error:"));
        assert!(err.source().is_some());
        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!err.is_mapping());
    }

    #[test]
    fn context_preserves_mapping_kind() {
        let err = AzureApiError::Mapping("bad".to_string()).context("resolving subscription");
        assert!(err.is_mapping());
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AzureApiError>();
    }
}
