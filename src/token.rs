//! Bearer tokens and the token-endpoint wire model.
//!
//! Both the instance metadata service and the Azure AD v1 token endpoint
//! answer with the same shape:
//!
//! ```json
//! { "access_token": "ey...", "expires_in": "3599", "expires_on": "1700000000",
//!   "resource": "https://vault.azure.net", "token_type": "Bearer" }
//! ```
//!
//! Numbers arrive either as JSON numbers or as numeric strings depending on
//! the endpoint, so the expiry fields are read leniently.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::model::{self, ResponseModel};

/// A short-lived bearer token for one Azure resource.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticationToken {
    /// The opaque bearer token.
    pub access_token: String,
    /// When the token stops being accepted.
    pub expiration: DateTime<Utc>,
}

impl AuthenticationToken {
    /// Creates a token.
    pub fn new(access_token: impl Into<String>, expiration: DateTime<Utc>) -> Self {
        AuthenticationToken {
            access_token: access_token.into(),
            expiration,
        }
    }

    /// Returns `true` if the token expires within `buffer` from now.
    pub fn is_expired_within(&self, buffer: Duration) -> bool {
        Utc::now() + buffer >= self.expiration
    }
}

// The access token is a credential; keep it out of logs.
impl std::fmt::Debug for AuthenticationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationToken")
            .field("access_token", &"[redacted]")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Token endpoint response.
#[derive(Clone, Debug)]
pub struct TokenResponse {
    /// Non-empty bearer token.
    pub access_token: String,
    /// Absolute expiration derived from `expires_in` or `expires_on`.
    pub access_token_expiration: DateTime<Utc>,
    /// `token_type`, usually `Bearer`.
    pub token_type: Option<String>,
    /// The resource the token was issued for.
    pub resource: Option<String>,
}

impl ResponseModel for TokenResponse {
    fn from_response_data(data: &Value) -> Result<Self> {
        let access_token = model::required_str(data, "access_token")?;
        if access_token.is_empty() {
            return Err(model::missing("access_token", data));
        }

        let access_token_expiration = match model::optional_lenient_i64(data, "expires_in")? {
            Some(seconds) => Duration::try_seconds(seconds)
                .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
                .ok_or_else(|| model::missing("expires_in", data))?,
            None => model::optional_lenient_i64(data, "expires_on")?
                .and_then(|epoch| Utc.timestamp_opt(epoch, 0).single())
                .ok_or_else(|| model::missing("expires_in", data))?,
        };

        Ok(TokenResponse {
            access_token,
            access_token_expiration,
            token_type: model::optional_str(data, "token_type")?,
            resource: model::optional_str(data, "resource")?,
        })
    }
}

impl From<TokenResponse> for AuthenticationToken {
    fn from(response: TokenResponse) -> Self {
        AuthenticationToken::new(response.access_token, response.access_token_expiration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_numeric_expires_in() {
        let data = json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "resource": "https://vault.azure.net",
            "access_token": "ey....ey"
        });
        let token = TokenResponse::from_response_data(&data).unwrap();
        assert_eq!(token.access_token, "ey....ey");
        assert_eq!(token.token_type.as_deref(), Some("Bearer"));
        assert_eq!(token.resource.as_deref(), Some("https://vault.azure.net"));
        let expected = Utc::now() + Duration::seconds(3599);
        let delta = (token.access_token_expiration - expected).num_seconds().abs();
        assert!(delta <= 1, "expiration off by {delta}s");
    }

    #[test]
    fn maps_string_expires_in() {
        let data = json!({ "access_token": "tok", "expires_in": "86399" });
        let token = TokenResponse::from_response_data(&data).unwrap();
        let expected = Utc::now() + Duration::seconds(86399);
        assert!((token.access_token_expiration - expected).num_seconds().abs() <= 1);
    }

    #[test]
    fn falls_back_to_expires_on() {
        let data = json!({ "access_token": "tok", "expires_on": "1700000000" });
        let token = TokenResponse::from_response_data(&data).unwrap();
        assert_eq!(token.access_token_expiration.timestamp(), 1_700_000_000);
    }

    #[test]
    fn missing_access_token_is_mapping_error() {
        let err = TokenResponse::from_response_data(&json!({ "foo": "bar" })).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"Failed to map response data: Missing or invalid "access_token" in response: {"foo":"bar"}"#
        );
    }

    #[test]
    fn empty_access_token_is_rejected() {
        let err = TokenResponse::from_response_data(&json!({ "access_token": "", "expires_in": 1 }))
            .unwrap_err();
        assert!(err.to_string().contains(r#"Missing or invalid "access_token""#));
    }

    #[test]
    fn missing_expiry_is_mapping_error() {
        let err = TokenResponse::from_response_data(&json!({ "access_token": "tok" })).unwrap_err();
        assert!(err.to_string().contains(r#"Missing or invalid "expires_in""#), "{err}");
    }

    #[test]
    fn expiry_buffer_check() {
        let token = AuthenticationToken::new("tok", Utc::now() + Duration::seconds(30));
        assert!(token.is_expired_within(Duration::seconds(60)));
        assert!(!token.is_expired_within(Duration::seconds(10)));
    }

    #[test]
    fn debug_redacts_access_token() {
        let token = AuthenticationToken::new("secret-value", Utc::now());
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("secret-value"));
        assert!(rendered.contains("[redacted]"));
    }
}
