use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::{
        billing_periods::BillingPeriod, subscription_statuses::SubscriptionStatus,
        subscription_tiers::SubscriptionTier,
    },
    infra::db::postgres::schema::subscriptions,
};

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tier: String,
    pub status: String,
    pub billing_period: String,
    pub payment_provider: String,
    pub external_subscription_id: Option<String>,
    pub customer_id: Option<String>,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<DateTime<Utc>>,
    pub trial_start: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
    pub last_event_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionEntity {
    pub fn tier(&self) -> SubscriptionTier {
        SubscriptionTier::from_str(&self.tier).unwrap_or_default()
    }

    pub fn status(&self) -> SubscriptionStatus {
        SubscriptionStatus::from_str(&self.status)
    }

    pub fn billing_period(&self) -> BillingPeriod {
        BillingPeriod::from_str(&self.billing_period).unwrap_or(BillingPeriod::Monthly)
    }

    /// Tier the user is entitled to right now; canceled rows fall back to FREE.
    pub fn effective_tier(&self) -> SubscriptionTier {
        if self.status().grants_tier() {
            self.tier()
        } else {
            SubscriptionTier::Free
        }
    }

    /// Whether a provider event created at `event_at` may still change this row.
    pub fn accepts_event_at(&self, event_at: DateTime<Utc>) -> bool {
        self.last_event_at.is_none_or(|last| last <= event_at)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = subscriptions)]
pub struct InsertSubscriptionEntity {
    pub user_id: Uuid,
    pub tier: String,
    pub status: String,
    pub billing_period: String,
    pub payment_provider: String,
    pub external_subscription_id: Option<String>,
    pub customer_id: Option<String>,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
    pub last_event_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Absolute field values taken from a provider subscription event.
/// `None` leaves a column untouched; `Some(None)` clears a nullable column.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = subscriptions)]
pub struct ProviderSubscriptionChangeset {
    pub tier: Option<String>,
    pub billing_period: Option<String>,
    pub status: String,
    pub cancel_at_period_end: bool,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub canceled_at: Option<Option<DateTime<Utc>>>,
    pub trial_start: Option<Option<DateTime<Utc>>>,
    pub trial_end: Option<Option<DateTime<Utc>>>,
    pub last_event_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
