use std::collections::HashMap;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use crates::payments::stripe_client::{CheckoutSessionParams, StripeClient, StripeSession};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub customer_id: String,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub trial_days: u32,
    pub metadata: HashMap<String, String>,
}

/// Calls the billing core makes to the payment provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_customer(
        &self,
        user_id: Uuid,
        email: Option<String>,
        name: Option<String>,
    ) -> AnyResult<String>;

    async fn create_checkout_session(&self, request: CheckoutRequest) -> AnyResult<StripeSession>;

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> AnyResult<StripeSession>;

    async fn cancel_at_period_end(&self, external_subscription_id: &str) -> AnyResult<()>;

    async fn reactivate(&self, external_subscription_id: &str) -> AnyResult<()>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool;
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_customer(
        &self,
        user_id: Uuid,
        email: Option<String>,
        name: Option<String>,
    ) -> AnyResult<String> {
        self.create_customer(user_id, email.as_deref(), name.as_deref())
            .await
    }

    async fn create_checkout_session(&self, request: CheckoutRequest) -> AnyResult<StripeSession> {
        self.create_checkout_session(CheckoutSessionParams {
            customer_id: &request.customer_id,
            price_id: &request.price_id,
            success_url: &request.success_url,
            cancel_url: &request.cancel_url,
            trial_days: request.trial_days,
            client_reference_id: request.user_id,
            metadata: request.metadata.clone(),
        })
        .await
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> AnyResult<StripeSession> {
        self.create_portal_session(customer_id, return_url).await
    }

    async fn cancel_at_period_end(&self, external_subscription_id: &str) -> AnyResult<()> {
        self.set_cancel_at_period_end(external_subscription_id, true)
            .await
    }

    async fn reactivate(&self, external_subscription_id: &str) -> AnyResult<()> {
        self.set_cancel_at_period_end(external_subscription_id, false)
            .await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        self.verify_webhook_signature(payload, signature)
    }
}
