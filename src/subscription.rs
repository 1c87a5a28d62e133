//! SaaS subscription models for the Marketplace fulfillment API.
//!
//! `POST /api/saas/subscriptions/resolve` exchanges the purchase token a
//! customer lands with for a [`ResolveSubscriptionResult`], which embeds the
//! full [`Subscription`].
//!
//! Reference: <https://learn.microsoft.com/en-us/partner-center/marketplace-offers/pc-saas-fulfillment-subscription-api>

use serde_json::Value;

use crate::error::Result;
use crate::model::{self, ResponseModel};

/// A customer or purchaser identity attached to a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    /// Contact e-mail.
    pub email_id: Option<String>,
    /// Entra object ID.
    pub object_id: Option<String>,
    /// Entra tenant ID.
    pub tenant_id: Option<String>,
}

impl ResponseModel for Party {
    fn from_response_data(data: &Value) -> Result<Self> {
        Ok(Party {
            email_id: model::optional_str(data, "emailId")?,
            object_id: model::optional_str(data, "objectId")?,
            tenant_id: model::optional_str(data, "tenantId")?,
        })
    }
}

/// A SaaS subscription as returned by the fulfillment API.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    /// Subscription ID (GUID).
    pub id: String,
    /// Publisher ID.
    pub publisher_id: String,
    /// Offer ID.
    pub offer_id: String,
    /// Customer-chosen subscription name.
    pub name: String,
    /// `PendingFulfillmentStart`, `Subscribed`, `Suspended` or `Unsubscribed`.
    pub saas_subscription_status: String,
    /// Plan ID.
    pub plan_id: String,
    /// Seat count for per-user plans.
    pub quantity: Option<u64>,
    /// The identity that uses the subscription.
    pub beneficiary: Option<Party>,
    /// The identity that pays for it.
    pub purchaser: Option<Party>,
    /// ISO 8601 billing term, e.g. `P1M`.
    pub term_unit: Option<String>,
    /// Test purchase flag.
    pub is_test: bool,
    /// Free trial flag.
    pub is_free_trial: bool,
    /// Whether the subscription renews automatically.
    pub auto_renew: bool,
    /// The object this value was mapped from.
    pub raw_data: Value,
}

fn optional_party(data: &Value, key: &str) -> Result<Option<Party>> {
    match model::optional_value(data, key)? {
        Some(party) if party.is_object() => Party::from_response_data(&party).map(Some),
        Some(_) => Err(model::missing(key, data)),
        None => Ok(None),
    }
}

impl ResponseModel for Subscription {
    fn from_response_data(data: &Value) -> Result<Self> {
        let term_unit = match model::optional_value(data, "term")? {
            Some(term) if term.is_object() => model::optional_str(&term, "termUnit")?,
            Some(_) => return Err(model::missing("term", data)),
            None => None,
        };

        Ok(Subscription {
            id: model::required_str(data, "id")?,
            publisher_id: model::required_str(data, "publisherId")?,
            offer_id: model::required_str(data, "offerId")?,
            name: model::required_str(data, "name")?,
            saas_subscription_status: model::required_str(data, "saasSubscriptionStatus")?,
            plan_id: model::required_str(data, "planId")?,
            quantity: model::optional_u64(data, "quantity")?,
            beneficiary: optional_party(data, "beneficiary")?,
            purchaser: optional_party(data, "purchaser")?,
            term_unit,
            is_test: model::flag(data, "isTest")?,
            is_free_trial: model::flag(data, "isFreeTrial")?,
            auto_renew: model::flag(data, "autoRenew")?,
            raw_data: data.clone(),
        })
    }
}

/// Result of resolving a marketplace purchase token.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveSubscriptionResult {
    /// Subscription ID.
    pub id: String,
    /// Subscription name.
    pub subscription_name: String,
    /// Offer ID.
    pub offer_id: String,
    /// Plan ID.
    pub plan_id: String,
    /// The full subscription.
    pub subscription: Subscription,
    /// The parsed response body, keys in the order received.
    pub raw_data: Value,
}

impl ResponseModel for ResolveSubscriptionResult {
    fn from_response_data(data: &Value) -> Result<Self> {
        let id = model::required_str(data, "id")?;
        let subscription_name = model::required_str(data, "subscriptionName")?;
        let offer_id = model::required_str(data, "offerId")?;
        let plan_id = model::required_str(data, "planId")?;
        let subscription = Subscription::from_response_data(model::required_object(
            data,
            "subscription",
        )?)?;

        Ok(ResolveSubscriptionResult {
            id,
            subscription_name,
            offer_id,
            plan_id,
            subscription,
            raw_data: data.clone(),
        })
    }
}
