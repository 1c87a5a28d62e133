//! Metered billing: usage events and their results.
//!
//! Reference: <https://learn.microsoft.com/en-us/partner-center/marketplace-offers/marketplace-metering-service-apis>

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::Result;
use crate::model::{self, ResponseModel};

/// A single usage record to submit to the metering API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEvent {
    /// The SaaS subscription ID (or managed app resource ID).
    pub resource_id: String,
    /// Units consumed. Must be positive.
    pub quantity: f64,
    /// Custom meter dimension as defined in the offer.
    pub dimension: String,
    /// Start of the hour the usage belongs to.
    #[serde(serialize_with = "serialize_utc")]
    pub effective_start_time: DateTime<Utc>,
    /// Plan the usage is billed against.
    pub plan_id: String,
}

fn serialize_utc<S: Serializer>(
    time: &DateTime<Utc>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Accepted usage event.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageEventResult {
    /// Server-assigned event ID.
    pub usage_event_id: String,
    /// Usually `Accepted`.
    pub status: String,
    /// When the metering service processed the event.
    pub message_time: Option<String>,
    /// Echo of the submitted resource ID.
    pub resource_id: Option<String>,
    /// Echo of the submitted quantity.
    pub quantity: Option<f64>,
    /// Echo of the submitted dimension.
    pub dimension: Option<String>,
    /// Echo of the submitted plan.
    pub plan_id: Option<String>,
    /// The parsed response body, keys in the order received.
    pub raw_data: Value,
}

impl ResponseModel for UsageEventResult {
    fn from_response_data(data: &Value) -> Result<Self> {
        Ok(UsageEventResult {
            usage_event_id: model::required_str(data, "usageEventId")?,
            status: model::required_str(data, "status")?,
            message_time: model::optional_str(data, "messageTime")?,
            resource_id: model::optional_str(data, "resourceId")?,
            quantity: model::optional_f64(data, "quantity")?,
            dimension: model::optional_str(data, "dimension")?,
            plan_id: model::optional_str(data, "planId")?,
            raw_data: data.clone(),
        })
    }
}

/// Error body returned when the metering API rejects an event, e.g. a
/// duplicate (`409 Conflict`) whose `additionalInfo` holds the event that
/// was accepted earlier.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageEventError {
    /// Machine-readable code, e.g. `Conflict` or `BadArgument`.
    pub code: String,
    /// Human-readable description.
    pub message: String,
    /// Free-form details; absent and `null` both map to `None`.
    pub additional_info: Option<Value>,
}

impl ResponseModel for UsageEventError {
    fn from_response_data(data: &Value) -> Result<Self> {
        Ok(UsageEventError {
            code: model::required_str(data, "code")?,
            message: model::required_str(data, "message")?,
            additional_info: model::optional_value(data, "additionalInfo")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn usage_event_serializes_camel_case() {
        let event = UsageEvent {
            resource_id: "sub-1".to_string(),
            quantity: 5.0,
            dimension: "dim1".to_string(),
            effective_start_time: Utc.with_ymd_and_hms(2018, 12, 1, 8, 0, 0).unwrap(),
            plan_id: "plan1".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["resourceId"], "sub-1");
        assert_eq!(value["quantity"], 5.0);
        assert_eq!(value["effectiveStartTime"], "2018-12-01T08:00:00Z");
        assert_eq!(value["planId"], "plan1");
    }

    #[test]
    fn usage_event_result_maps() {
        let data = json!({
            "usageEventId": "c5e7b3f2-0000-0000-0000-000000000000",
            "status": "Accepted",
            "messageTime": "2020-01-12T13:19:35.3458658Z",
            "resourceId": "sub-1",
            "quantity": 5.0,
            "dimension": "dim1",
            "effectiveStartTime": "2018-12-01T08:30:14",
            "planId": "plan1"
        });
        let result = UsageEventResult::from_response_data(&data).unwrap();
        assert_eq!(result.status, "Accepted");
        assert_eq!(result.quantity, Some(5.0));
        assert_eq!(result.raw_data, data);
    }

    #[test]
    fn usage_event_error_with_additional_info() {
        let data = json!({
            "additionalInfo": { "acceptedMessage": { "usageEventId": "prev" } },
            "message": "This usage event already exist.",
            "code": "Conflict"
        });
        let error = UsageEventError::from_response_data(&data).unwrap();
        assert_eq!(error.code, "Conflict");
        assert_eq!(error.message, "This usage event already exist.");
        assert_eq!(
            error.additional_info,
            Some(json!({ "acceptedMessage": { "usageEventId": "prev" } }))
        );
    }

    #[test]
    fn missing_additional_info_equals_null() {
        let absent = UsageEventError::from_response_data(&json!({
            "code": "BadArgument",
            "message": "One or more errors have occurred."
        }))
        .unwrap();
        let null = UsageEventError::from_response_data(&json!({
            "code": "BadArgument",
            "message": "One or more errors have occurred.",
            "additionalInfo": null
        }))
        .unwrap();
        assert_eq!(absent.additional_info, None);
        assert_eq!(absent, null);
    }

    #[test]
    fn usage_event_error_requires_code_and_message() {
        let err = UsageEventError::from_response_data(&json!({ "code": "Conflict" })).unwrap_err();
        assert!(err.to_string().contains(r#"Missing or invalid "message""#), "{err}");
    }
}
