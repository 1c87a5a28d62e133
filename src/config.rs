//! Client configuration shared by every API client in the crate.
//!
//! `ClientOptions` carries the retry budget, the backoff strategy and the
//! transport timeouts. It is a plain value: construct it with `Default` and
//! adjust with the `with_*` methods.

use std::sync::Arc;
use std::time::Duration;

use crate::backoff::{BackoffPolicy, ExponentialBackoff};

/// Environment variable holding the Azure AD tenant for client credentials.
pub const AZURE_TENANT_ID: &str = "AZURE_TENANT_ID";
/// Environment variable holding the application (client) ID.
pub const AZURE_CLIENT_ID: &str = "AZURE_CLIENT_ID";
/// Environment variable holding the client secret.
pub const AZURE_CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";
/// Environment variable overriding the Azure AD authority host.
pub const AZURE_AUTHORITY_HOST: &str = "AZURE_AUTHORITY_HOST";
/// Environment variable overriding the instance metadata service host.
pub const AZURE_POD_IDENTITY_AUTHORITY_HOST: &str = "AZURE_POD_IDENTITY_AUTHORITY_HOST";

/// Number of retries after the first attempt when nothing else is configured.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Covers TCP + TLS handshake only.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Covers the full round-trip including the response body.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for the retrying HTTP client.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: u32,
    /// Delay strategy between attempts.
    pub backoff: Arc<dyn BackoffPolicy>,
    /// TCP + TLS connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub request_timeout: Duration,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl ClientOptions {
    /// Sets the number of retries after the first attempt.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Replaces the backoff strategy.
    pub fn with_backoff<B: BackoffPolicy + 'static>(mut self, backoff: B) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the whole-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the `User-Agent` header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Arc::new(ExponentialBackoff::default()),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: concat!("azure-api-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Reads a setting through `lookup`, treating empty values as unset.
pub(crate) fn non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).filter(|v| !v.trim().is_empty())
}

/// Looks a variable up in the process environment.
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::NoBackoff;

    #[test]
    fn defaults() {
        let options = ClientOptions::default();
        assert_eq!(options.max_retries, 5);
        assert_eq!(options.connect_timeout, Duration::from_secs(10));
        assert_eq!(options.request_timeout, Duration::from_secs(30));
        assert!(options.user_agent.starts_with("azure-api-client/"));
    }

    #[test]
    fn builder_methods_override() {
        let options = ClientOptions::default()
            .with_max_retries(1)
            .with_backoff(NoBackoff)
            .with_request_timeout(Duration::from_secs(2))
            .with_user_agent("test-agent");
        assert_eq!(options.max_retries, 1);
        assert_eq!(options.request_timeout, Duration::from_secs(2));
        assert_eq!(options.user_agent, "test-agent");
        assert_eq!(options.backoff.delay(1), Duration::ZERO);
    }

    #[test]
    fn non_empty_filters_blank_values() {
        let lookup = |name: &str| match name {
            "SET" => Some("value".to_string()),
            "BLANK" => Some("  ".to_string()),
            _ => None,
        };
        assert_eq!(non_empty(&lookup, "SET").as_deref(), Some("value"));
        assert_eq!(non_empty(&lookup, "BLANK"), None);
        assert_eq!(non_empty(&lookup, "MISSING"), None);
    }
}
