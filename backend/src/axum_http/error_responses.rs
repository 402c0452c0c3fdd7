use axum::{
    Json,
    response::{IntoResponse, Response},
};
use crates::domain::value_objects::{
    enums::{subscription_tiers::SubscriptionTier, usage_kinds::UsageKind},
    feature_limits::{Quota, Remaining},
};
use serde::Serialize;

use crate::usecases::errors::BillingError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota: Option<QuotaDetails>,
}

/// Attached to quota failures so callers can offer an upgrade.
#[derive(Debug, Serialize)]
pub struct QuotaDetails {
    pub kind: UsageKind,
    pub remaining: Remaining,
    pub limit: Quota,
    pub required_tier: Option<SubscriptionTier>,
}

impl IntoResponse for BillingError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let quota = match &self {
            BillingError::QuotaExceeded {
                kind,
                remaining,
                limit,
                required_tier,
            } => Some(QuotaDetails {
                kind: *kind,
                remaining: *remaining,
                limit: *limit,
                required_tier: *required_tier,
            }),
            _ => None,
        };

        let message = match &self {
            // Don't leak internal error detail to client
            BillingError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            message,
            quota,
        });

        (status, body).into_response()
    }
}
