pub mod payment_provider_customers;
pub mod payments;
pub mod subscriptions;
pub mod usage_periods;
pub mod webhook_event_receipts;
