pub mod billing_webhook;
pub mod clock;
pub mod errors;
pub mod payment_gateway;
pub mod subscription_store;
pub mod subscriptions;
pub mod usage_ledger;
