use std::sync::Arc;

use crates::domain::{
    entities::usage_periods::UsagePeriodEntity,
    repositories::{
        subscriptions::SubscriptionRepository,
        usage_periods::{ConsumeOutcome, UsagePeriodRepository},
    },
    value_objects::{
        enums::{subscription_tiers::SubscriptionTier, usage_kinds::UsageKind},
        feature_limits::{FeatureLimits, Remaining},
        subscriptions::UsageRecordedDto,
        usage::UsageWindow,
    },
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::usecases::{
    clock::Clock,
    errors::{BillingError, BillingResult},
};

/// Per-user quota accounting: AI enhancements roll over daily, everything
/// else with the monthly window.
pub struct UsageLedgerUseCase<U, S>
where
    U: UsagePeriodRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
{
    usage_repo: Arc<U>,
    subscription_repo: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<U, S> UsageLedgerUseCase<U, S>
where
    U: UsagePeriodRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
{
    pub fn new(usage_repo: Arc<U>, subscription_repo: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            usage_repo,
            subscription_repo,
            clock,
        }
    }

    async fn current_tier_and_window(
        &self,
        user_id: Uuid,
    ) -> BillingResult<(SubscriptionTier, UsageWindow)> {
        let now = self.clock.now();
        let subscription = self
            .subscription_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "usage: failed to load subscription");
                BillingError::Internal(err)
            })?;

        let tier = subscription
            .as_ref()
            .map(|sub| sub.effective_tier())
            .unwrap_or_default();
        Ok((tier, UsageWindow::monthly(subscription.as_ref(), now)))
    }

    /// Counters for the current window; zeroed when nothing was recorded yet.
    pub async fn get_current_usage(&self, user_id: Uuid) -> BillingResult<UsagePeriodEntity> {
        let (_, window) = self.current_tier_and_window(user_id).await?;
        self.usage_in_window(user_id, window).await
    }

    async fn usage_in_window(
        &self,
        user_id: Uuid,
        window: UsageWindow,
    ) -> BillingResult<UsagePeriodEntity> {
        let now = self.clock.now();
        let period = self
            .usage_repo
            .find_period(user_id, window.start)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "usage: failed to load usage period");
                BillingError::Internal(err)
            })?;

        Ok(match period {
            Some(period) => period.rolled_over(now),
            None => UsagePeriodEntity::empty(user_id, window, now),
        })
    }

    pub async fn remaining(
        &self,
        user_id: Uuid,
        tier: SubscriptionTier,
        kind: UsageKind,
    ) -> BillingResult<Remaining> {
        let usage = self.get_current_usage(user_id).await?;
        let quota = FeatureLimits::for_tier(tier).quota(kind);
        Ok(quota.remaining(usage.used(kind)))
    }

    /// Consumes one unit of `kind`. The quota check and the increment happen
    /// under the same row lock, so concurrent calls cannot overshoot.
    pub async fn record_usage(
        &self,
        user_id: Uuid,
        kind: UsageKind,
    ) -> BillingResult<UsageRecordedDto> {
        let now = self.clock.now();
        let (tier, window) = self.current_tier_and_window(user_id).await?;
        let quota = FeatureLimits::for_tier(tier).quota(kind);

        let outcome = self
            .usage_repo
            .try_consume(user_id, window, kind, quota, now)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %kind,
                    db_error = ?err,
                    "usage: failed to record usage"
                );
                BillingError::Internal(err)
            })?;

        match outcome {
            ConsumeOutcome::Consumed(period) => {
                let remaining = quota.remaining(period.used(kind));
                info!(%user_id, %kind, %tier, remaining = ?remaining, "usage: recorded");
                Ok(UsageRecordedDto { kind, remaining })
            }
            ConsumeOutcome::QuotaExceeded(period) => {
                let err = BillingError::QuotaExceeded {
                    kind,
                    remaining: quota.remaining(period.used(kind)),
                    limit: quota,
                    required_tier: FeatureLimits::tier_lifting_quota(kind, tier),
                };
                warn!(
                    %user_id,
                    %kind,
                    %tier,
                    status = err.status_code().as_u16(),
                    "usage: quota exceeded"
                );
                Err(err)
            }
        }
    }
}
