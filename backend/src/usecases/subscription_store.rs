use std::sync::Arc;

use chrono::{DateTime, Utc};
use crates::domain::{
    entities::subscriptions::SubscriptionEntity,
    repositories::subscriptions::SubscriptionRepository,
    value_objects::{
        enums::subscription_statuses::SubscriptionStatus,
        subscriptions::{
            CheckoutCompletion, ProviderSubscriptionUpdate, ProviderUpdateOutcome,
            SubscriptionView,
        },
    },
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::usecases::errors::{BillingError, BillingResult};

/// Single source of truth for a user's tier and lifecycle status.
pub struct SubscriptionStore<S>
where
    S: SubscriptionRepository + Send + Sync + 'static,
{
    subscription_repo: Arc<S>,
}

impl<S> SubscriptionStore<S>
where
    S: SubscriptionRepository + Send + Sync + 'static,
{
    pub fn new(subscription_repo: Arc<S>) -> Self {
        Self { subscription_repo }
    }

    pub async fn find_by_user_id(&self, user_id: Uuid) -> BillingResult<Option<SubscriptionEntity>> {
        self.subscription_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    db_error = ?err,
                    "subscriptions: failed to load subscription"
                );
                BillingError::Internal(err)
            })
    }

    pub async fn find_by_external_subscription_id(
        &self,
        external_subscription_id: &str,
    ) -> BillingResult<Option<SubscriptionEntity>> {
        self.subscription_repo
            .find_by_external_subscription_id(external_subscription_id)
            .await
            .map_err(|err| {
                error!(
                    %external_subscription_id,
                    db_error = ?err,
                    "subscriptions: failed to load subscription by external id"
                );
                BillingError::Internal(err)
            })
    }

    /// The user's subscription, or the implicit FREE view. Never inserts.
    pub async fn get_or_create_default(&self, user_id: Uuid) -> BillingResult<SubscriptionView> {
        Ok(self
            .find_by_user_id(user_id)
            .await?
            .map(SubscriptionView::from)
            .unwrap_or_else(SubscriptionView::free))
    }

    pub async fn upsert_on_checkout_completed(
        &self,
        completion: CheckoutCompletion,
    ) -> BillingResult<SubscriptionEntity> {
        let user_id = completion.user_id;
        let external_subscription_id = completion.external_subscription_id.clone();

        let subscription = self
            .subscription_repo
            .upsert_on_checkout_completed(completion)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %external_subscription_id,
                    db_error = ?err,
                    "subscriptions: failed to upsert subscription after checkout"
                );
                BillingError::Internal(err)
            })?;

        info!(
            %user_id,
            %external_subscription_id,
            tier = %subscription.tier,
            "subscriptions: checkout completion recorded"
        );
        Ok(subscription)
    }

    pub async fn apply_provider_update(
        &self,
        update: ProviderSubscriptionUpdate,
    ) -> BillingResult<ProviderUpdateOutcome> {
        let external_subscription_id = update.external_subscription_id.clone();
        let status = update.status;
        let event_at = update.event_at;

        let outcome = self
            .subscription_repo
            .apply_provider_update(update)
            .await
            .map_err(|err| {
                error!(
                    %external_subscription_id,
                    db_error = ?err,
                    "subscriptions: failed to apply provider update"
                );
                BillingError::Internal(err)
            })?;

        Self::log_outcome(&external_subscription_id, outcome, event_at, "update");
        if outcome == ProviderUpdateOutcome::Applied {
            info!(%external_subscription_id, %status, "subscriptions: provider update applied");
        }
        Ok(outcome)
    }

    pub async fn apply_provider_deletion(
        &self,
        external_subscription_id: &str,
        canceled_at: DateTime<Utc>,
        event_at: DateTime<Utc>,
    ) -> BillingResult<ProviderUpdateOutcome> {
        let outcome = self
            .subscription_repo
            .apply_provider_deletion(external_subscription_id, canceled_at, event_at)
            .await
            .map_err(|err| {
                error!(
                    %external_subscription_id,
                    db_error = ?err,
                    "subscriptions: failed to apply provider deletion"
                );
                BillingError::Internal(err)
            })?;

        Self::log_outcome(external_subscription_id, outcome, event_at, "deletion");
        Ok(outcome)
    }

    /// Payment failure. Never resurrects a canceled subscription.
    pub async fn mark_past_due(
        &self,
        external_subscription_id: &str,
        event_at: DateTime<Utc>,
    ) -> BillingResult<ProviderUpdateOutcome> {
        self.transition(
            external_subscription_id,
            vec![
                SubscriptionStatus::Active,
                SubscriptionStatus::Trialing,
                SubscriptionStatus::PastDue,
            ],
            SubscriptionStatus::PastDue,
            event_at,
        )
        .await
    }

    /// Payment recovered: only PAST_DUE moves back to ACTIVE.
    pub async fn mark_recovered(
        &self,
        external_subscription_id: &str,
        event_at: DateTime<Utc>,
    ) -> BillingResult<ProviderUpdateOutcome> {
        self.transition(
            external_subscription_id,
            vec![SubscriptionStatus::PastDue],
            SubscriptionStatus::Active,
            event_at,
        )
        .await
    }

    async fn transition(
        &self,
        external_subscription_id: &str,
        from: Vec<SubscriptionStatus>,
        to: SubscriptionStatus,
        event_at: DateTime<Utc>,
    ) -> BillingResult<ProviderUpdateOutcome> {
        let outcome = self
            .subscription_repo
            .update_status_by_external_subscription_id(external_subscription_id, from, to, event_at)
            .await
            .map_err(|err| {
                error!(
                    %external_subscription_id,
                    status = %to,
                    db_error = ?err,
                    "subscriptions: failed to update subscription status"
                );
                BillingError::Internal(err)
            })?;

        if outcome == ProviderUpdateOutcome::Applied {
            info!(%external_subscription_id, status = %to, "subscriptions: status updated");
        } else {
            info!(
                %external_subscription_id,
                status = %to,
                outcome = ?outcome,
                "subscriptions: status transition not applicable"
            );
        }
        Ok(outcome)
    }

    /// External subscription id of a paid, non-canceled subscription.
    pub async fn require_active_external_id(&self, user_id: Uuid) -> BillingResult<String> {
        self.find_by_user_id(user_id)
            .await?
            .filter(|sub| sub.status() != SubscriptionStatus::Canceled)
            .and_then(|sub| sub.external_subscription_id)
            .ok_or_else(|| {
                let err = BillingError::NoActiveSubscription;
                warn!(
                    %user_id,
                    status = err.status_code().as_u16(),
                    "subscriptions: no active paid subscription"
                );
                err
            })
    }

    /// Optimistic local flip after a user action; the provider's next event
    /// reconciles it.
    pub async fn set_cancel_at_period_end(
        &self,
        user_id: Uuid,
        cancel_at_period_end: bool,
        now: DateTime<Utc>,
    ) -> BillingResult<SubscriptionEntity> {
        self.require_active_external_id(user_id).await?;

        let canceled_at = cancel_at_period_end.then_some(now);
        self.subscription_repo
            .set_cancel_at_period_end(user_id, cancel_at_period_end, canceled_at)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    db_error = ?err,
                    "subscriptions: failed to update cancel_at_period_end"
                );
                BillingError::Internal(err)
            })?
            .ok_or(BillingError::NoActiveSubscription)
    }

    pub async fn clear_cancellation(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> BillingResult<SubscriptionEntity> {
        self.set_cancel_at_period_end(user_id, false, now).await
    }

    fn log_outcome(
        external_subscription_id: &str,
        outcome: ProviderUpdateOutcome,
        event_at: DateTime<Utc>,
        kind: &str,
    ) {
        match outcome {
            ProviderUpdateOutcome::Applied => {}
            ProviderUpdateOutcome::Stale => info!(
                %external_subscription_id,
                %event_at,
                "subscriptions: stale provider {kind} ignored"
            ),
            ProviderUpdateOutcome::NotFound => warn!(
                %external_subscription_id,
                "subscriptions: provider {kind} for unknown subscription dropped"
            ),
        }
    }
}
