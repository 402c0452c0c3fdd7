use std::sync::Arc;

use crates::{
    domain::{
        entities::{
            payments::InsertPaymentEntity,
            webhook_event_receipts::InsertWebhookEventReceiptEntity,
        },
        repositories::{
            payment_provider_customers::PaymentProviderCustomerRepository,
            payments::PaymentRepository, subscriptions::SubscriptionRepository,
            webhook_event_receipts::WebhookEventReceiptRepository,
        },
        value_objects::{
            enums::{
                billing_periods::BillingPeriod, payment_statuses::PaymentStatus,
                subscription_statuses::SubscriptionStatus, subscription_tiers::SubscriptionTier,
                webhook_event_statuses::WebhookEventStatus,
            },
            pricing::PriceIds,
            subscriptions::{CheckoutCompletion, ProviderSubscriptionUpdate},
            webhook_events::{
                CheckoutSessionObject, InvoiceObject, ProviderEvent, ProviderEventBody,
                SubscriptionObject, ts_to_datetime,
            },
        },
    },
    infra::db::repositories::subscriptions::STRIPE_PROVIDER,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::usecases::{
    clock::Clock,
    errors::{BillingError, BillingResult},
    payment_gateway::PaymentGateway,
    subscription_store::SubscriptionStore,
};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Processed,
    /// Already handled; nothing was re-applied.
    Duplicate,
    /// Accepted and recorded without a state change.
    Ignored,
}

/// Turns the provider's at-least-once, unordered event feed into subscription
/// state. Receipts are written last so a failed handler is retried on redelivery.
pub struct BillingWebhookUseCase<S, R, Pay, Cust, G>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    R: WebhookEventReceiptRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    Cust: PaymentProviderCustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    store: SubscriptionStore<S>,
    receipt_repo: Arc<R>,
    payment_repo: Arc<Pay>,
    customer_repo: Arc<Cust>,
    gateway: Arc<G>,
    price_ids: PriceIds,
    clock: Arc<dyn Clock>,
}

impl<S, R, Pay, Cust, G> BillingWebhookUseCase<S, R, Pay, Cust, G>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    R: WebhookEventReceiptRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    Cust: PaymentProviderCustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(
        subscription_repo: Arc<S>,
        receipt_repo: Arc<R>,
        payment_repo: Arc<Pay>,
        customer_repo: Arc<Cust>,
        gateway: Arc<G>,
        price_ids: PriceIds,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store: SubscriptionStore::new(subscription_repo),
            receipt_repo,
            payment_repo,
            customer_repo,
            gateway,
            price_ids,
            clock,
        }
    }

    pub async fn process(&self, payload: &[u8], signature: &str) -> BillingResult<WebhookOutcome> {
        if !self.gateway.verify_webhook_signature(payload, signature) {
            let err = BillingError::InvalidSignature;
            warn!(
                status = err.status_code().as_u16(),
                payload_bytes = payload.len(),
                "billing_webhook: signature verification failed"
            );
            return Err(err);
        }

        let event = ProviderEvent::parse(payload).map_err(|err| {
            warn!(error = %err, "billing_webhook: unparseable event");
            BillingError::UnparseableEvent(err.to_string())
        })?;

        let event_id = event.id.clone();
        let event_type = event.event_type.clone();
        info!(%event_id, %event_type, "billing_webhook: event verified");

        let already_handled = self.receipt_repo.exists(&event_id).await.map_err(|err| {
            error!(%event_id, db_error = ?err, "billing_webhook: receipt lookup failed");
            BillingError::Internal(err)
        })?;
        if already_handled {
            info!(%event_id, %event_type, "billing_webhook: duplicate delivery skipped");
            return Ok(WebhookOutcome::Duplicate);
        }

        let status = self.dispatch(&event).await.map_err(|err| {
            error!(
                %event_id,
                %event_type,
                error = %err,
                "billing_webhook: handler failed, receipt not recorded"
            );
            err
        })?;

        let receipt = InsertWebhookEventReceiptEntity {
            external_event_id: event_id.clone(),
            event_type: event_type.clone(),
            processed_at: self.clock.now(),
            status: status.to_string(),
            raw_payload: event.raw,
        };

        let recorded = self.receipt_repo.record(receipt).await.map_err(|err| {
            error!(%event_id, db_error = ?err, "billing_webhook: failed to record receipt");
            BillingError::Internal(err)
        })?;
        if !recorded {
            info!(%event_id, "billing_webhook: concurrent delivery recorded first");
            return Ok(WebhookOutcome::Duplicate);
        }

        info!(%event_id, %event_type, %status, "billing_webhook: event recorded");
        Ok(match status {
            WebhookEventStatus::Processed => WebhookOutcome::Processed,
            WebhookEventStatus::Ignored => WebhookOutcome::Ignored,
        })
    }

    async fn dispatch(&self, event: &ProviderEvent) -> BillingResult<WebhookEventStatus> {
        match &event.body {
            ProviderEventBody::CheckoutCompleted(session) => {
                self.handle_checkout_completed(event, session).await
            }
            ProviderEventBody::SubscriptionUpdated(subscription) => {
                self.handle_subscription_updated(event, subscription).await
            }
            ProviderEventBody::SubscriptionDeleted(subscription) => {
                let canceled_at = subscription
                    .canceled_at
                    .and_then(ts_to_datetime)
                    .unwrap_or(event.created);
                self.store
                    .apply_provider_deletion(&subscription.id, canceled_at, event.created)
                    .await?;
                Ok(WebhookEventStatus::Processed)
            }
            ProviderEventBody::PaymentSucceeded(invoice) => {
                self.handle_invoice(event, invoice, PaymentStatus::Succeeded)
                    .await
            }
            ProviderEventBody::PaymentFailed(invoice) => {
                self.handle_invoice(event, invoice, PaymentStatus::Failed)
                    .await
            }
            ProviderEventBody::Unrecognized => {
                debug!(event_type = %event.event_type, "billing_webhook: unhandled event type");
                Ok(WebhookEventStatus::Ignored)
            }
        }
    }

    async fn handle_checkout_completed(
        &self,
        event: &ProviderEvent,
        session: &CheckoutSessionObject,
    ) -> BillingResult<WebhookEventStatus> {
        if session.mode.as_deref().is_some_and(|mode| mode != "subscription") {
            info!(
                session_id = %session.id,
                mode = ?session.mode,
                "billing_webhook: non-subscription checkout ignored"
            );
            return Ok(WebhookEventStatus::Ignored);
        }

        let external_subscription_id = session.subscription.clone().ok_or_else(|| {
            BillingError::UnparseableEvent("checkout session has no subscription".to_string())
        })?;
        let customer_id = session.customer.clone().ok_or_else(|| {
            BillingError::UnparseableEvent("checkout session has no customer".to_string())
        })?;

        let user_id = self.resolve_checkout_user(session, &customer_id).await?;

        self.customer_repo
            .insert_customer_ref(user_id, STRIPE_PROVIDER, &customer_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    db_error = ?err,
                    "billing_webhook: failed to record provider customer"
                );
                BillingError::Internal(err)
            })?;

        let tier = session
            .metadata
            .get("tier")
            .and_then(|tier| SubscriptionTier::from_str(tier))
            .filter(SubscriptionTier::is_paid)
            .unwrap_or(SubscriptionTier::Pro);
        let billing_period = session
            .metadata
            .get("billing_period")
            .and_then(|period| BillingPeriod::from_str(period))
            .unwrap_or(BillingPeriod::Monthly);

        self.store
            .upsert_on_checkout_completed(CheckoutCompletion {
                user_id,
                customer_id,
                external_subscription_id,
                tier,
                billing_period,
                event_at: event.created,
            })
            .await?;

        Ok(WebhookEventStatus::Processed)
    }

    async fn resolve_checkout_user(
        &self,
        session: &CheckoutSessionObject,
        customer_id: &str,
    ) -> BillingResult<Uuid> {
        let from_session = session
            .metadata
            .get("user_id")
            .or(session.client_reference_id.as_ref())
            .and_then(|raw| Uuid::parse_str(raw).ok());
        if let Some(user_id) = from_session {
            return Ok(user_id);
        }

        self.customer_repo
            .find_user_by_customer_ref(STRIPE_PROVIDER, customer_id)
            .await
            .map_err(|err| {
                error!(%customer_id, db_error = ?err, "billing_webhook: customer lookup failed");
                BillingError::Internal(err)
            })?
            .ok_or_else(|| {
                BillingError::UnparseableEvent(format!(
                    "checkout session {} cannot be attributed to a user",
                    session.id
                ))
            })
    }

    async fn handle_subscription_updated(
        &self,
        event: &ProviderEvent,
        subscription: &SubscriptionObject,
    ) -> BillingResult<WebhookEventStatus> {
        let Some(status) = SubscriptionStatus::from_provider(&subscription.status) else {
            warn!(
                external_subscription_id = %subscription.id,
                provider_status = %subscription.status,
                "billing_webhook: unknown provider subscription status ignored"
            );
            return Ok(WebhookEventStatus::Ignored);
        };

        let (tier, billing_period) = match subscription
            .price_id()
            .and_then(|price_id| self.price_ids.resolve(price_id))
        {
            Some((tier, period)) => (Some(tier), Some(period)),
            None => (
                subscription
                    .metadata
                    .get("tier")
                    .and_then(|tier| SubscriptionTier::from_str(tier))
                    .filter(SubscriptionTier::is_paid),
                subscription
                    .metadata
                    .get("billing_period")
                    .and_then(|period| BillingPeriod::from_str(period)),
            ),
        };

        self.store
            .apply_provider_update(ProviderSubscriptionUpdate {
                external_subscription_id: subscription.id.clone(),
                status,
                cancel_at_period_end: subscription.cancel_at_period_end,
                tier,
                billing_period,
                current_period_start: subscription.period_start(),
                current_period_end: subscription.period_end(),
                canceled_at: subscription.canceled_at.and_then(ts_to_datetime),
                trial_start: subscription.trial_start.and_then(ts_to_datetime),
                trial_end: subscription.trial_end.and_then(ts_to_datetime),
                event_at: event.created,
            })
            .await?;

        Ok(WebhookEventStatus::Processed)
    }

    async fn handle_invoice(
        &self,
        event: &ProviderEvent,
        invoice: &InvoiceObject,
        payment_status: PaymentStatus,
    ) -> BillingResult<WebhookEventStatus> {
        let subscription = match invoice.subscription.as_deref() {
            Some(external_id) => self.store.find_by_external_subscription_id(external_id).await?,
            None => None,
        };

        let user_id = match subscription.as_ref() {
            Some(sub) => Some(sub.user_id),
            None => match invoice.customer.as_deref() {
                Some(customer_ref) => self
                    .customer_repo
                    .find_user_by_customer_ref(STRIPE_PROVIDER, customer_ref)
                    .await
                    .map_err(|err| {
                        error!(%customer_ref, db_error = ?err, "billing_webhook: customer lookup failed");
                        BillingError::Internal(err)
                    })?,
                None => None,
            },
        };

        match user_id {
            Some(user_id) => {
                let amount_minor = match payment_status {
                    PaymentStatus::Succeeded => invoice.amount_paid,
                    PaymentStatus::Failed => invoice.amount_due,
                };
                let payment = InsertPaymentEntity {
                    user_id,
                    subscription_id: subscription.as_ref().map(|sub| sub.id),
                    external_payment_id: invoice.external_payment_id().to_string(),
                    provider: STRIPE_PROVIDER.to_string(),
                    amount_minor,
                    currency: invoice
                        .currency
                        .as_deref()
                        .unwrap_or("usd")
                        .to_ascii_lowercase(),
                    status: payment_status.to_string(),
                    invoice_id: Some(invoice.id.clone()),
                };

                let inserted = self.payment_repo.record_payment(payment).await.map_err(|err| {
                    error!(
                        %user_id,
                        invoice_id = %invoice.id,
                        db_error = ?err,
                        "billing_webhook: failed to record payment"
                    );
                    BillingError::Internal(err)
                })?;
                info!(
                    %user_id,
                    invoice_id = %invoice.id,
                    status = %payment_status,
                    inserted,
                    "billing_webhook: payment recorded"
                );
            }
            None => warn!(
                invoice_id = %invoice.id,
                "billing_webhook: payment for unknown customer not recorded"
            ),
        }

        if let Some(external_subscription_id) = invoice.subscription.as_deref() {
            match payment_status {
                PaymentStatus::Succeeded => {
                    self.store
                        .mark_recovered(external_subscription_id, event.created)
                        .await?;
                }
                PaymentStatus::Failed => {
                    self.store
                        .mark_past_due(external_subscription_id, event.created)
                        .await?;
                }
            }
        }

        Ok(WebhookEventStatus::Processed)
    }
}
