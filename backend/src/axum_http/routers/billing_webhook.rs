use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use crates::domain::repositories::{
    payment_provider_customers::PaymentProviderCustomerRepository,
    payments::PaymentRepository, subscriptions::SubscriptionRepository,
    webhook_event_receipts::WebhookEventReceiptRepository,
};
use serde_json::json;
use tracing::warn;

use crate::usecases::{
    billing_webhook::BillingWebhookUseCase, errors::BillingError,
    payment_gateway::PaymentGateway,
};

const SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes<S, R, Pay, Cust, G>(
    webhook_usecase: Arc<BillingWebhookUseCase<S, R, Pay, Cust, G>>,
) -> Router
where
    S: SubscriptionRepository + Send + Sync + 'static,
    R: WebhookEventReceiptRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    Cust: PaymentProviderCustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/webhook", post(receive_event))
        .with_state(webhook_usecase)
}

/// Answers 2xx only once the event is recorded or known to be a duplicate;
/// anything else makes the provider redeliver.
pub async fn receive_event<S, R, Pay, Cust, G>(
    State(webhook_usecase): State<Arc<BillingWebhookUseCase<S, R, Pay, Cust, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    R: WebhookEventReceiptRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    Cust: PaymentProviderCustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        warn!("billing_webhook router: missing stripe-signature header");
        return BillingError::InvalidSignature.into_response();
    };

    match webhook_usecase.process(&body, signature).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({ "received": true, "outcome": outcome })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
