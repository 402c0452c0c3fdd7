use axum::http::StatusCode;
use crates::domain::value_objects::{
    enums::{
        billing_periods::BillingPeriod, subscription_tiers::SubscriptionTier,
        usage_kinds::UsageKind,
    },
    feature_limits::{Quota, Remaining},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("webhook signature verification failed")]
    InvalidSignature,
    #[error("unparseable webhook event: {0}")]
    UnparseableEvent(String),
    #[error("no billing account for this user")]
    NoSubscription,
    #[error("no active paid subscription")]
    NoActiveSubscription,
    #[error("tier cannot be purchased: {0}")]
    InvalidTier(String),
    #[error("unknown billing period: {0}")]
    InvalidBillingPeriod(String),
    #[error("no price configured for {tier} {period}")]
    PricingNotConfigured {
        tier: SubscriptionTier,
        period: BillingPeriod,
    },
    #[error("unknown feature: {0}")]
    UnknownFeature(String),
    #[error("{kind} quota exceeded")]
    QuotaExceeded {
        kind: UsageKind,
        remaining: Remaining,
        limit: Quota,
        required_tier: Option<SubscriptionTier>,
    },
    #[error("payment provider unavailable")]
    ProviderUnavailable(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BillingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BillingError::InvalidSignature
            | BillingError::UnparseableEvent(_)
            | BillingError::InvalidTier(_)
            | BillingError::InvalidBillingPeriod(_) => StatusCode::BAD_REQUEST,
            BillingError::NoSubscription | BillingError::UnknownFeature(_) => StatusCode::NOT_FOUND,
            BillingError::NoActiveSubscription => StatusCode::CONFLICT,
            BillingError::QuotaExceeded { .. } => StatusCode::FORBIDDEN,
            BillingError::PricingNotConfigured { .. } => StatusCode::SERVICE_UNAVAILABLE,
            BillingError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            BillingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type BillingResult<T> = std::result::Result<T, BillingError>;
