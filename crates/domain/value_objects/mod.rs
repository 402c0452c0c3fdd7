pub mod enums;
pub mod feature_limits;
pub mod pricing;
pub mod subscriptions;
pub mod usage;
pub mod webhook_events;
