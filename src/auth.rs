//! Authenticators that turn a resource URI into a bearer token.
//!
//! Two flows are supported:
//! - [`ManagedCredentialsAuthenticator`](crate::managed_identity::ManagedCredentialsAuthenticator)
//!   asks the instance metadata service of the VM the code runs on.
//! - [`ClientCredentialsAuthenticator`] posts an application's tenant, client
//!   ID and secret to the Azure AD v1 token endpoint.
//!
//! [`AuthenticatorFactory`] picks between them from configuration.

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use tracing::{debug, info};

use crate::client::ApiClient;
use crate::config::{self, ClientOptions};
use crate::error::{AzureApiError, Result};
use crate::managed_identity::ManagedCredentialsAuthenticator;
use crate::token::{AuthenticationToken, TokenResponse};

/// Azure AD authority used when `AZURE_AUTHORITY_HOST` is not set.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com/";

/// Produces bearer tokens for Azure resources.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Obtains a token for `resource` (e.g. `https://vault.azure.net`).
    async fn get_authentication_token(&self, resource: &str) -> Result<AuthenticationToken>;

    /// Fails if this authenticator cannot work in the current environment.
    async fn check_usability(&self) -> Result<()>;
}

/// Form body sent to the v1 token endpoint.
/// Serialized as `application/x-www-form-urlencoded` by reqwest's `.form()`.
#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    resource: &'a str,
}

/// Client-credentials grant against Azure AD.
pub struct ClientCredentialsAuthenticator {
    client: ApiClient,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl ClientCredentialsAuthenticator {
    /// Creates an authenticator against the default authority host.
    pub fn new(
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
        options: ClientOptions,
    ) -> Result<Self> {
        Self::with_authority_host(
            DEFAULT_AUTHORITY_HOST,
            tenant_id,
            client_id,
            client_secret,
            options,
        )
    }

    /// Creates an authenticator against a custom authority host (sovereign
    /// clouds, or a local mock server in tests).
    pub fn with_authority_host(
        authority_host: &str,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
        options: ClientOptions,
    ) -> Result<Self> {
        Ok(ClientCredentialsAuthenticator {
            client: ApiClient::new(authority_host, options)?,
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }
}

#[async_trait]
impl Authenticator for ClientCredentialsAuthenticator {
    async fn get_authentication_token(&self, resource: &str) -> Result<AuthenticationToken> {
        let form = TokenRequest {
            grant_type: "client_credentials",
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            resource,
        };
        let path = format!("{}/oauth2/token", self.tenant_id);
        let request = self.client.request(Method::POST, &path).form(&form);

        let token: TokenResponse = self.client.send_and_map(request).await?;
        info!("Successfully authenticated using client credentials.");
        Ok(token.into())
    }

    async fn check_usability(&self) -> Result<()> {
        let settings = [
            (config::AZURE_TENANT_ID, &self.tenant_id),
            (config::AZURE_CLIENT_ID, &self.client_id),
            (config::AZURE_CLIENT_SECRET, &self.client_secret),
        ];
        match settings.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((name, _)) => Err(AzureApiError::Config(format!("{name} is not set"))
                .context("Client credentials are not usable")),
            None => Ok(()),
        }
    }
}

/// Chooses an authenticator from configuration.
///
/// Client credentials win when `AZURE_TENANT_ID`, `AZURE_CLIENT_ID` and
/// `AZURE_CLIENT_SECRET` are all set; otherwise the instance metadata
/// service is used.
pub struct AuthenticatorFactory<F = fn(&str) -> Option<String>>
where
    F: Fn(&str) -> Option<String>,
{
    options: ClientOptions,
    lookup: F,
}

impl AuthenticatorFactory {
    /// Reads configuration from the process environment.
    pub fn new(options: ClientOptions) -> Self {
        AuthenticatorFactory {
            options,
            lookup: config::env_lookup,
        }
    }
}

impl<F> AuthenticatorFactory<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Reads configuration through `lookup` instead of the process environment.
    pub fn from_lookup(options: ClientOptions, lookup: F) -> Self {
        AuthenticatorFactory { options, lookup }
    }

    /// Builds the client-credentials authenticator if fully configured.
    fn client_credentials(&self) -> Result<Option<ClientCredentialsAuthenticator>> {
        let tenant = config::non_empty(&self.lookup, config::AZURE_TENANT_ID);
        let client = config::non_empty(&self.lookup, config::AZURE_CLIENT_ID);
        let secret = config::non_empty(&self.lookup, config::AZURE_CLIENT_SECRET);
        let (Some(tenant), Some(client), Some(secret)) = (tenant, client, secret) else {
            return Ok(None);
        };
        let authority = config::non_empty(&self.lookup, config::AZURE_AUTHORITY_HOST)
            .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string());
        ClientCredentialsAuthenticator::with_authority_host(
            &authority,
            &tenant,
            &client,
            &secret,
            self.options.clone(),
        )
        .map(Some)
    }

    /// Builds the managed identity authenticator, honoring the
    /// `AZURE_POD_IDENTITY_AUTHORITY_HOST` endpoint override and a
    /// user-assigned `AZURE_CLIENT_ID`.
    pub fn managed_identity(&self) -> Result<ManagedCredentialsAuthenticator> {
        let endpoint = config::non_empty(&self.lookup, config::AZURE_POD_IDENTITY_AUTHORITY_HOST);
        let authenticator =
            ManagedCredentialsAuthenticator::with_endpoint(endpoint.as_deref(), self.options.clone())?;
        Ok(match config::non_empty(&self.lookup, config::AZURE_CLIENT_ID) {
            Some(client_id) => authenticator.with_client_id(client_id),
            None => authenticator,
        })
    }

    /// Creates the authenticator best suited to the current configuration.
    pub async fn create(&self) -> Result<Box<dyn Authenticator>> {
        if let Some(credentials) = self.client_credentials()? {
            match credentials.check_usability().await {
                Ok(()) => {
                    debug!("using client credentials authenticator");
                    return Ok(Box::new(credentials));
                }
                Err(e) => debug!(error = %e, "client credentials not usable"),
            }
        } else {
            debug!("client credentials not configured");
        }
        debug!("using managed identity authenticator");
        Ok(Box::new(self.managed_identity()?))
    }
}
