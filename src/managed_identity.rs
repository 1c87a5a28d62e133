//! Managed identity tokens from the Azure Instance Metadata Service (IMDS).
//!
//! IMDS listens on the link-local address `169.254.169.254` inside every
//! Azure VM. Tokens are requested with:
//!
//! ```text
//! GET /metadata/identity/oauth2/token?api-version=2019-11-01&format=text&resource=<resource>
//! Metadata: true
//! ```
//!
//! The `Metadata: true` header is mandatory; IMDS rejects requests without it
//! as a guard against SSRF.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use tracing::info;

use crate::auth::Authenticator;
use crate::client::ApiClient;
use crate::config::ClientOptions;
use crate::error::Result;
use crate::token::{AuthenticationToken, TokenResponse};

/// Well-known IMDS address.
pub const INSTANCE_METADATA_SERVICE_ENDPOINT: &str = "http://169.254.169.254/";

const API_VERSION: &str = "2019-11-01";
const TOKEN_PATH: &str = "metadata/identity/oauth2/token";
const METADATA_PATH: &str = "metadata";

/// Authenticates as the VM's managed identity.
pub struct ManagedCredentialsAuthenticator {
    client: ApiClient,
    client_id: Option<String>,
}

impl ManagedCredentialsAuthenticator {
    /// Creates an authenticator against the real metadata service.
    pub fn new(options: ClientOptions) -> Result<Self> {
        Self::with_endpoint(None, options)
    }

    /// Creates an authenticator against `endpoint`, or the well-known
    /// address when `None`.
    pub fn with_endpoint(endpoint: Option<&str>, options: ClientOptions) -> Result<Self> {
        let endpoint = endpoint.unwrap_or(INSTANCE_METADATA_SERVICE_ENDPOINT);
        Ok(ManagedCredentialsAuthenticator {
            client: ApiClient::new(endpoint, options)?,
            client_id: None,
        })
    }

    /// Requests tokens for a user-assigned identity instead of the
    /// system-assigned one.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// The metadata service base URL in use.
    pub fn endpoint(&self) -> &str {
        self.client.base_url()
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .request(Method::GET, path)
            .query(&[("api-version", API_VERSION), ("format", "text")])
            .header("Metadata", "true")
    }
}

#[async_trait]
impl Authenticator for ManagedCredentialsAuthenticator {
    async fn get_authentication_token(&self, resource: &str) -> Result<AuthenticationToken> {
        let mut request = self.get(TOKEN_PATH).query(&[("resource", resource)]);
        if let Some(client_id) = &self.client_id {
            request = request.query(&[("client_id", client_id)]);
        }

        let token: TokenResponse = self.client.send_and_map(request).await?;
        info!("Successfully authenticated using instance metadata.");
        Ok(token.into())
    }

    async fn check_usability(&self) -> Result<()> {
        self.client
            .send(self.get(METADATA_PATH))
            .await
            .map(|_| ())
            .map_err(|e| e.context("Instance metadata service not available"))
    }
}
