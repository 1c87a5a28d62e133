//! Azure Marketplace SaaS fulfillment and metering client.
//!
//! | Method | API Path |
//! |--------|----------|
//! | [`MarketplaceClient::resolve_subscription`] | POST `/api/saas/subscriptions/resolve` |
//! | [`MarketplaceClient::activate_subscription`] | POST `/api/saas/subscriptions/{id}/activate` |
//! | [`MarketplaceClient::report_usage_event`] | POST `/api/usageEvent` |
//!
//! Token lifecycle:
//! - Lazy acquisition: the first call fetches a token for the marketplace
//!   resource through the configured [`Authenticator`].
//! - The token is reused until it is within [`TOKEN_EXPIRY_BUFFER_SECS`] of
//!   its expiration, then replaced on the next call.

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::auth::Authenticator;
use crate::client::ApiClient;
use crate::config::ClientOptions;
use crate::error::{AzureApiError, Result};
use crate::model::{ResponseModel, parse_json};
use crate::subscription::ResolveSubscriptionResult;
use crate::token::AuthenticationToken;
use crate::usage::{UsageEvent, UsageEventError, UsageEventResult};

/// Marketplace API base URL.
pub const MARKETPLACE_ENDPOINT: &str = "https://marketplaceapi.microsoft.com/";

/// Fixed resource ID of the Marketplace API, used as the token audience.
pub const MARKETPLACE_RESOURCE: &str = "20e940b3-4c77-4b0b-9a53-9e16a1b010a7";

const API_VERSION: &str = "2018-08-31";

/// Seconds before expiration at which a cached token is considered stale.
pub const TOKEN_EXPIRY_BUFFER_SECS: i64 = 60;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActivateRequest<'a> {
    plan_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    quantity: Option<u64>,
}

/// Authenticated client for the Marketplace SaaS APIs.
///
/// `token` sits behind a `Mutex` so concurrent callers share one refresh.
/// The lock is held only for the check/refresh, never across an API call.
pub struct MarketplaceClient {
    client: ApiClient,
    authenticator: Box<dyn Authenticator>,
    token: Mutex<Option<AuthenticationToken>>,
}

impl MarketplaceClient {
    /// Creates a client for the public Marketplace endpoint.
    pub fn new(authenticator: Box<dyn Authenticator>, options: ClientOptions) -> Result<Self> {
        Self::with_base_url(authenticator, MARKETPLACE_ENDPOINT, options)
    }

    /// Creates a client against a custom base URL, used by tests to point
    /// at a local mock server.
    pub fn with_base_url(
        authenticator: Box<dyn Authenticator>,
        base_url: &str,
        options: ClientOptions,
    ) -> Result<Self> {
        Ok(MarketplaceClient {
            client: ApiClient::new(base_url, options)?,
            authenticator,
            token: Mutex::new(None),
        })
    }

    async fn bearer_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        let buffer = chrono::Duration::seconds(TOKEN_EXPIRY_BUFFER_SECS);
        if let Some(token) = cached.as_ref().filter(|t| !t.is_expired_within(buffer)) {
            return Ok(token.access_token.clone());
        }

        debug!("acquiring marketplace token");
        let token = self
            .authenticator
            .get_authentication_token(MARKETPLACE_RESOURCE)
            .await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.bearer_token().await?;
        Ok(request
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(token))
    }

    async fn post(&self, path: &str) -> Result<RequestBuilder> {
        self.authorize(self.client.request(Method::POST, path)).await
    }

    /// Resolves the purchase token a customer arrived with from the
    /// marketplace landing page.
    pub async fn resolve_subscription(
        &self,
        marketplace_token: &str,
    ) -> Result<ResolveSubscriptionResult> {
        let request = self
            .post("api/saas/subscriptions/resolve")
            .await?
            .header("x-ms-marketplace-token", marketplace_token);
        self.client
            .send_and_map(request)
            .await
            .map_err(|e| e.context("Failed to resolve marketplace subscription"))
    }

    /// Activates a resolved subscription on `plan_id`.
    pub async fn activate_subscription(
        &self,
        subscription_id: &str,
        plan_id: &str,
        quantity: Option<u64>,
    ) -> Result<()> {
        let request = self.client.request_segments(
            Method::POST,
            &["api", "saas", "subscriptions", subscription_id, "activate"],
        )?;
        let request = self
            .authorize(request)
            .await?
            .json(&ActivateRequest { plan_id, quantity });
        self.client
            .send(request)
            .await
            .map(|_| ())
            .map_err(|e| e.context(format!("Failed to activate subscription {subscription_id}")))
    }

    /// Submits one usage event.
    ///
    /// A `400` or `409` whose body is a metering error object fails with
    /// `AzureApiError::UsageEvent`; the caller can inspect `additional_info`
    /// to find the event accepted earlier in the duplicate case.
    pub async fn report_usage_event(&self, event: &UsageEvent) -> Result<UsageEventResult> {
        let request = self.post("api/usageEvent").await?.json(event);
        self.client
            .send_and_map(request)
            .await
            .map_err(usage_event_error)
    }
}

fn usage_event_error(error: AzureApiError) -> AzureApiError {
    if let AzureApiError::Api { status, body, .. } = &error {
        if matches!(*status, StatusCode::BAD_REQUEST | StatusCode::CONFLICT) {
            let mapped = parse_json(body).and_then(|d| UsageEventError::from_response_data(&d));
            if let Ok(mapped) = mapped {
                return AzureApiError::UsageEvent {
                    status: *status,
                    error: mapped,
                };
            }
        }
    }
    error.context("Failed to report usage event")
}
