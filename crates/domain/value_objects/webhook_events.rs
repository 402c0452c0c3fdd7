use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const CUSTOMER_SUBSCRIPTION_CREATED: &str = "customer.subscription.created";
pub const CUSTOMER_SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
pub const CUSTOMER_SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";
pub const INVOICE_PAID: &str = "invoice.paid";
pub const INVOICE_PAYMENT_SUCCEEDED: &str = "invoice.payment_succeeded";
pub const INVOICE_PAYMENT_FAILED: &str = "invoice.payment_failed";

/// A provider webhook event, parsed once at ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEvent {
    pub id: String,
    pub event_type: String,
    pub created: DateTime<Utc>,
    pub body: ProviderEventBody,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEventBody {
    CheckoutCompleted(CheckoutSessionObject),
    SubscriptionUpdated(SubscriptionObject),
    SubscriptionDeleted(SubscriptionObject),
    PaymentSucceeded(InvoiceObject),
    PaymentFailed(InvoiceObject),
    /// Event types this system does not act on.
    Unrecognized,
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    id: String,
    #[serde(rename = "type")]
    type_: String,
    created: i64,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    pub mode: Option<String>,
    pub customer: Option<String>,
    pub subscription: Option<String>,
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
    pub customer: Option<String>,
    pub status: String,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub canceled_at: Option<i64>,
    pub trial_start: Option<i64>,
    pub trial_end: Option<i64>,
    #[serde(default)]
    pub items: SubscriptionItems,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscriptionItem {
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub price: Option<PriceObject>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PriceObject {
    pub id: String,
}

impl SubscriptionObject {
    /// Period start, falling back to the first item when the top-level field is absent.
    pub fn period_start(&self) -> Option<DateTime<Utc>> {
        self.current_period_start
            .or_else(|| {
                self.items
                    .data
                    .first()
                    .and_then(|item| item.current_period_start)
            })
            .and_then(ts_to_datetime)
    }

    pub fn period_end(&self) -> Option<DateTime<Utc>> {
        self.current_period_end
            .or_else(|| {
                self.items
                    .data
                    .first()
                    .and_then(|item| item.current_period_end)
            })
            .and_then(ts_to_datetime)
    }

    pub fn price_id(&self) -> Option<&str> {
        self.items
            .data
            .iter()
            .find_map(|item| item.price.as_ref().map(|price| price.id.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InvoiceObject {
    pub id: String,
    pub customer: Option<String>,
    pub subscription: Option<String>,
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub amount_due: i64,
    pub currency: Option<String>,
}

impl InvoiceObject {
    /// Ledger key for the payment attempt behind this invoice.
    pub fn external_payment_id(&self) -> &str {
        self.payment_intent.as_deref().unwrap_or(&self.id)
    }
}

impl ProviderEvent {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let raw: Value = serde_json::from_slice(payload).context("payload is not JSON")?;
        let envelope: EventEnvelope =
            serde_json::from_value(raw.clone()).context("invalid event envelope")?;

        let created = ts_to_datetime(envelope.created).context("invalid event timestamp")?;
        let object = envelope.data.object;

        let body = match envelope.type_.as_str() {
            CHECKOUT_SESSION_COMPLETED => ProviderEventBody::CheckoutCompleted(
                serde_json::from_value(object).context("invalid checkout session object")?,
            ),
            CUSTOMER_SUBSCRIPTION_CREATED | CUSTOMER_SUBSCRIPTION_UPDATED => {
                ProviderEventBody::SubscriptionUpdated(
                    serde_json::from_value(object).context("invalid subscription object")?,
                )
            }
            CUSTOMER_SUBSCRIPTION_DELETED => ProviderEventBody::SubscriptionDeleted(
                serde_json::from_value(object).context("invalid subscription object")?,
            ),
            INVOICE_PAID | INVOICE_PAYMENT_SUCCEEDED => ProviderEventBody::PaymentSucceeded(
                serde_json::from_value(object).context("invalid invoice object")?,
            ),
            INVOICE_PAYMENT_FAILED => ProviderEventBody::PaymentFailed(
                serde_json::from_value(object).context("invalid invoice object")?,
            ),
            _ => ProviderEventBody::Unrecognized,
        };

        Ok(Self {
            id: envelope.id,
            event_type: envelope.type_,
            created,
            body,
            raw,
        })
    }
}

pub fn ts_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0).single()
}
