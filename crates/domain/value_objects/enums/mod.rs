pub mod billing_periods;
pub mod currencies;
pub mod payment_statuses;
pub mod subscription_statuses;
pub mod subscription_tiers;
pub mod usage_kinds;
pub mod webhook_event_statuses;
