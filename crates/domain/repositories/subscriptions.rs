use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::subscriptions::SubscriptionEntity,
    value_objects::{
        enums::subscription_statuses::SubscriptionStatus,
        subscriptions::{CheckoutCompletion, ProviderSubscriptionUpdate, ProviderUpdateOutcome},
    },
};

#[automock]
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    async fn find_by_external_subscription_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<SubscriptionEntity>>;

    /// Inserts the user's row or refreshes its identifiers. Conflicts on the
    /// unique `user_id` resolve to an update, never a second row.
    async fn upsert_on_checkout_completed(
        &self,
        completion: CheckoutCompletion,
    ) -> Result<SubscriptionEntity>;

    /// Writes absolute provider state when the event is not older than the row.
    async fn apply_provider_update(
        &self,
        update: ProviderSubscriptionUpdate,
    ) -> Result<ProviderUpdateOutcome>;

    async fn apply_provider_deletion(
        &self,
        external_subscription_id: &str,
        canceled_at: DateTime<Utc>,
        event_at: DateTime<Utc>,
    ) -> Result<ProviderUpdateOutcome>;

    /// Moves a row to `to` only while its status is one of `from`.
    async fn update_status_by_external_subscription_id(
        &self,
        external_subscription_id: &str,
        from: Vec<SubscriptionStatus>,
        to: SubscriptionStatus,
        event_at: DateTime<Utc>,
    ) -> Result<ProviderUpdateOutcome>;

    async fn set_cancel_at_period_end(
        &self,
        user_id: Uuid,
        cancel_at_period_end: bool,
        canceled_at: Option<DateTime<Utc>>,
    ) -> Result<Option<SubscriptionEntity>>;
}
