use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    entities::subscriptions::SubscriptionEntity,
    value_objects::{
        enums::{
            billing_periods::BillingPeriod, subscription_statuses::SubscriptionStatus,
            subscription_tiers::SubscriptionTier, usage_kinds::UsageKind,
        },
        feature_limits::{Feature, FeatureLimits, Remaining},
        usage::UsageSummaryDto,
    },
};

/// Read model of a user's subscription. Users without a row see the implicit
/// FREE/ACTIVE view with no provider identifiers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubscriptionView {
    pub tier: SubscriptionTier,
    pub effective_tier: SubscriptionTier,
    pub status: SubscriptionStatus,
    pub billing_period: Option<BillingPeriod>,
    pub external_subscription_id: Option<String>,
    pub customer_id: Option<String>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<DateTime<Utc>>,
    pub trial_start: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
}

impl SubscriptionView {
    pub fn free() -> Self {
        Self {
            tier: SubscriptionTier::Free,
            effective_tier: SubscriptionTier::Free,
            status: SubscriptionStatus::Active,
            billing_period: None,
            external_subscription_id: None,
            customer_id: None,
            current_period_start: None,
            current_period_end: None,
            cancel_at_period_end: false,
            canceled_at: None,
            trial_start: None,
            trial_end: None,
        }
    }
}

impl From<SubscriptionEntity> for SubscriptionView {
    fn from(value: SubscriptionEntity) -> Self {
        Self {
            tier: value.tier(),
            effective_tier: value.effective_tier(),
            status: value.status(),
            billing_period: Some(value.billing_period()),
            current_period_start: Some(value.current_period_start),
            current_period_end: Some(value.current_period_end),
            cancel_at_period_end: value.cancel_at_period_end,
            canceled_at: value.canceled_at,
            trial_start: value.trial_start,
            trial_end: value.trial_end,
            external_subscription_id: value.external_subscription_id,
            customer_id: value.customer_id,
        }
    }
}

/// Identifiers delivered by a completed checkout. The tier is provisional
/// until the provider's next subscription update confirms it.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutCompletion {
    pub user_id: uuid::Uuid,
    pub customer_id: String,
    pub external_subscription_id: String,
    pub tier: SubscriptionTier,
    pub billing_period: BillingPeriod,
    pub event_at: DateTime<Utc>,
}

/// Absolute subscription state reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSubscriptionUpdate {
    pub external_subscription_id: String,
    pub status: SubscriptionStatus,
    pub cancel_at_period_end: bool,
    pub tier: Option<SubscriptionTier>,
    pub billing_period: Option<BillingPeriod>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub trial_start: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
    pub event_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderUpdateOutcome {
    Applied,
    /// The row already reflects a newer provider event.
    Stale,
    /// No row carries this external subscription id (or it is not in an eligible status).
    NotFound,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntitlementDto {
    pub subscription: SubscriptionView,
    pub limits: FeatureLimits,
    pub usage: UsageSummaryDto,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeatureCheckDto {
    pub feature: Feature,
    pub available: bool,
    pub required_tier: SubscriptionTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<Remaining>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UsageRecordedDto {
    pub kind: UsageKind,
    pub remaining: Remaining,
}

#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    pub tier: String,
    pub billing_period: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CheckoutSessionDto {
    pub session_id: String,
    pub checkout_url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PortalSessionDto {
    pub portal_url: String,
}
