//! Retrying HTTP client shared by every Azure endpoint in the crate.
//!
//! `ApiClient` wraps a `reqwest::Client` bound to one base URL. Callers build
//! a request with [`ApiClient::request`] (adding query parameters, headers,
//! bodies or bearer auth as needed) and hand it back to
//! [`ApiClient::send`] or [`ApiClient::send_and_map`].
//!
//! Retry behavior:
//! - Transport failures, `5xx` and `429 Too Many Requests` are retried up to
//!   `ClientOptions::max_retries` times, sleeping for whatever the configured
//!   [`BackoffPolicy`](crate::backoff::BackoffPolicy) returns between attempts.
//! - Any other non-success status fails immediately.
//! - Mapping failures happen after the exchange completed and are never
//!   retried.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, Request, RequestBuilder, StatusCode, Url};
use tracing::{debug, warn};

use crate::config::ClientOptions;
use crate::error::{AzureApiError, Result};
use crate::model::{ResponseModel, parse_json};

/// HTTP client bound to a single base URL, with retry and response mapping.
///
/// `base_url` always ends with `/`; request paths are appended without their
/// leading slash.
#[derive(Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    options: ClientOptions,
}

impl ApiClient {
    /// Creates a client for `base_url`.
    ///
    /// Fails with `AzureApiError::Config` if the URL does not parse or the
    /// underlying transport cannot be constructed.
    pub fn new(base_url: &str, options: ClientOptions) -> Result<Self> {
        let base_url = normalize_base_url(base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .connect_timeout(options.connect_timeout)
            .timeout(options.request_timeout)
            .user_agent(options.user_agent.as_str())
            .default_headers(headers)
            .build()
            .map_err(|e| AzureApiError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(ApiClient {
            client,
            base_url,
            options,
        })
    }

    /// The normalized base URL, always ending with `/`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The options this client was built with.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Starts a request for `path`, relative to the base URL.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path.trim_start_matches('/'));
        self.client.request(method, url)
    }

    /// Starts a request whose path is built from `segments`, each one
    /// percent-encoded so `/`, `?` and `#` stay inside their segment.
    pub fn request_segments(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AzureApiError::Config(format!("invalid base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| AzureApiError::Config(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(self.client.request(method, url))
    }

    /// Sends the request, retrying transient failures, and returns the body
    /// of the first successful response.
    pub async fn send(&self, builder: RequestBuilder) -> Result<String> {
        let request = builder
            .build()
            .map_err(|e| AzureApiError::Config(format!("invalid request: {e}")))?;
        self.execute_with_retry(request).await
    }

    /// Sends the request and maps the JSON body into `T`.
    pub async fn send_and_map<T: ResponseModel>(&self, builder: RequestBuilder) -> Result<T> {
        let body = self.send(builder).await?;
        let data = parse_json(&body)?;
        T::from_response_data(&data)
    }

    async fn execute_with_retry(&self, request: Request) -> Result<String> {
        let method = request.method().clone();
        let url = request.url().to_string();
        let mut attempt: u32 = 0;
        let mut current = request;

        loop {
            attempt += 1;
            // Bodies built from bytes (JSON, forms) always clone; a streaming
            // body cannot be replayed, so such a request gets one attempt.
            let spare = current.try_clone();
            debug!(%method, %url, attempt, "sending request");

            let failure = match self.client.execute(current).await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        // A body cut short is a transport failure and is retried.
                        match response.text().await {
                            Ok(body) => return Ok(body),
                            Err(source) => AzureApiError::Network {
                                method: method.clone(),
                                url: url.clone(),
                                source,
                            },
                        }
                    } else {
                        // Read the body so the error keeps the server's diagnostics.
                        let body = response.text().await.unwrap_or_default();
                        AzureApiError::Api {
                            method: method.clone(),
                            url: url.clone(),
                            status,
                            body,
                        }
                    }
                }
                Err(source) => AzureApiError::Network {
                    method: method.clone(),
                    url: url.clone(),
                    source,
                },
            };

            match spare {
                Some(next) if is_retryable(&failure) && attempt <= self.options.max_retries => {
                    let delay = self.options.backoff.delay(attempt);
                    warn!(
                        %method,
                        %url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure,
                        "request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    current = next;
                }
                _ => return Err(failure),
            }
        }
    }
}

fn is_retryable(error: &AzureApiError) -> bool {
    match error {
        AzureApiError::Network { .. } => true,
        AzureApiError::Api { status, .. } => {
            status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
        }
        _ => false,
    }
}

fn normalize_base_url(base_url: &str) -> Result<String> {
    let url = Url::parse(base_url)
        .map_err(|e| AzureApiError::Config(format!("invalid base URL {base_url:?}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(AzureApiError::Config(format!(
            "invalid base URL {base_url:?}: cannot be a base"
        )));
    }
    let mut normalized = url.to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Ok(normalized)
}
