use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::usage_periods::UsagePeriodEntity,
    value_objects::{enums::usage_kinds::UsageKind, feature_limits::Quota, usage::UsageWindow},
};

#[derive(Debug, Clone, PartialEq)]
pub enum ConsumeOutcome {
    Consumed(UsagePeriodEntity),
    QuotaExceeded(UsagePeriodEntity),
}

#[automock]
#[async_trait]
pub trait UsagePeriodRepository: Send + Sync {
    async fn find_period(
        &self,
        user_id: Uuid,
        period_start: DateTime<Utc>,
    ) -> Result<Option<UsagePeriodEntity>>;

    /// Creates the window's row if needed, then checks `quota` and increments
    /// `kind` while holding the row lock.
    async fn try_consume(
        &self,
        user_id: Uuid,
        window: UsageWindow,
        kind: UsageKind,
        quota: Quota,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome>;
}
