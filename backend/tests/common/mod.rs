//! Shared harness for backend integration tests

#![allow(dead_code)]

pub mod fakes;
pub mod memory_repos;

use std::sync::Arc;

use backend::usecases::{
    billing_webhook::{BillingWebhookUseCase, WebhookOutcome},
    clock::Clock,
    errors::BillingResult,
    subscriptions::{CheckoutSettings, SubscriptionUseCase},
};
use chrono::{DateTime, Utc};
use crates::{
    domain::value_objects::pricing::PriceIds, payments::stripe_client::signature_header,
};
use serde_json::{Value, json};
use uuid::Uuid;

pub use fakes::{FakeGateway, SettableClock};
pub use memory_repos::{
    InMemoryCustomers, InMemoryPayments, InMemoryReceipts, InMemorySubscriptions, InMemoryUsage,
};

pub const WEBHOOK_SECRET: &str = "whsec_integration";

pub fn price_ids() -> PriceIds {
    PriceIds {
        pro_monthly: Some("price_pro_monthly".to_string()),
        pro_yearly: Some("price_pro_yearly".to_string()),
        premium_monthly: Some("price_premium_monthly".to_string()),
        premium_yearly: None,
    }
}

pub struct TestApp {
    pub subscriptions: Arc<InMemorySubscriptions>,
    pub receipts: Arc<InMemoryReceipts>,
    pub payments: Arc<InMemoryPayments>,
    pub customers: Arc<InMemoryCustomers>,
    pub usage: Arc<InMemoryUsage>,
    pub gateway: Arc<FakeGateway>,
    pub clock: Arc<SettableClock>,
    pub webhook: BillingWebhookUseCase<
        InMemorySubscriptions,
        InMemoryReceipts,
        InMemoryPayments,
        InMemoryCustomers,
        FakeGateway,
    >,
    pub service:
        SubscriptionUseCase<InMemorySubscriptions, InMemoryUsage, InMemoryCustomers, FakeGateway>,
}

impl TestApp {
    pub fn new(now: DateTime<Utc>) -> Self {
        let subscriptions = Arc::new(InMemorySubscriptions::default());
        let receipts = Arc::new(InMemoryReceipts::default());
        let payments = Arc::new(InMemoryPayments::default());
        let customers = Arc::new(InMemoryCustomers::default());
        let usage = Arc::new(InMemoryUsage::default());
        let gateway = Arc::new(FakeGateway::new(WEBHOOK_SECRET));
        let clock = Arc::new(SettableClock::new(now));
        let dyn_clock: Arc<dyn Clock> = clock.clone();

        let webhook = BillingWebhookUseCase::new(
            Arc::clone(&subscriptions),
            Arc::clone(&receipts),
            Arc::clone(&payments),
            Arc::clone(&customers),
            Arc::clone(&gateway),
            price_ids(),
            Arc::clone(&dyn_clock),
        );

        let service = SubscriptionUseCase::new(
            Arc::clone(&subscriptions),
            Arc::clone(&usage),
            Arc::clone(&customers),
            Arc::clone(&gateway),
            CheckoutSettings {
                price_ids: price_ids(),
                success_url: "https://app.test/billing/success".to_string(),
                cancel_url: "https://app.test/billing/cancel".to_string(),
                portal_return_url: "https://app.test/settings".to_string(),
                trial_days: 14,
            },
            dyn_clock,
        );

        Self {
            subscriptions,
            receipts,
            payments,
            customers,
            usage,
            gateway,
            clock,
            webhook,
            service,
        }
    }

    /// Signs `event` with the webhook secret and runs it through the processor.
    pub async fn deliver(&self, event: &Value) -> BillingResult<WebhookOutcome> {
        let payload = serde_json::to_vec(event).unwrap();
        let signature =
            signature_header(WEBHOOK_SECRET, Utc::now().timestamp(), &payload).unwrap();
        self.webhook.process(&payload, &signature).await
    }
}

fn envelope(id: &str, event_type: &str, created: i64, object: Value) -> Value {
    json!({
        "id": id,
        "object": "event",
        "type": event_type,
        "created": created,
        "data": { "object": object }
    })
}

pub fn checkout_completed(
    event_id: &str,
    created: i64,
    user_id: Uuid,
    subscription_id: &str,
    customer_id: &str,
    tier: &str,
) -> Value {
    envelope(
        event_id,
        "checkout.session.completed",
        created,
        json!({
            "id": format!("cs_{event_id}"),
            "object": "checkout.session",
            "mode": "subscription",
            "customer": customer_id,
            "subscription": subscription_id,
            "client_reference_id": user_id.to_string(),
            "metadata": {
                "user_id": user_id.to_string(),
                "tier": tier,
                "billing_period": "monthly"
            }
        }),
    )
}

pub fn subscription_updated(
    event_id: &str,
    created: i64,
    subscription_id: &str,
    status: &str,
    price_id: &str,
    cancel_at_period_end: bool,
) -> Value {
    envelope(
        event_id,
        "customer.subscription.updated",
        created,
        json!({
            "id": subscription_id,
            "object": "subscription",
            "customer": "cus_1",
            "status": status,
            "cancel_at_period_end": cancel_at_period_end,
            "current_period_start": created - 86_400,
            "current_period_end": created + 29 * 86_400,
            "items": { "data": [ { "price": { "id": price_id } } ] }
        }),
    )
}

pub fn subscription_deleted(event_id: &str, created: i64, subscription_id: &str) -> Value {
    envelope(
        event_id,
        "customer.subscription.deleted",
        created,
        json!({
            "id": subscription_id,
            "object": "subscription",
            "customer": "cus_1",
            "status": "canceled",
            "canceled_at": created
        }),
    )
}

pub fn invoice_event(
    event_id: &str,
    event_type: &str,
    created: i64,
    invoice_id: &str,
    subscription_id: &str,
    customer_id: &str,
) -> Value {
    envelope(
        event_id,
        event_type,
        created,
        json!({
            "id": invoice_id,
            "object": "invoice",
            "customer": customer_id,
            "subscription": subscription_id,
            "payment_intent": format!("pi_{invoice_id}"),
            "amount_paid": 999,
            "amount_due": 999,
            "currency": "usd"
        }),
    )
}
