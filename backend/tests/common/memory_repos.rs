//! In-memory repositories with the same guard semantics as the Postgres ones

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crates::domain::{
    entities::{
        payments::InsertPaymentEntity, subscriptions::SubscriptionEntity,
        usage_periods::UsagePeriodEntity,
        webhook_event_receipts::InsertWebhookEventReceiptEntity,
    },
    repositories::{
        payment_provider_customers::PaymentProviderCustomerRepository,
        payments::PaymentRepository,
        subscriptions::SubscriptionRepository,
        usage_periods::{ConsumeOutcome, UsagePeriodRepository},
        webhook_event_receipts::WebhookEventReceiptRepository,
    },
    value_objects::{
        enums::{subscription_statuses::SubscriptionStatus, usage_kinds::UsageKind},
        feature_limits::Quota,
        subscriptions::{CheckoutCompletion, ProviderSubscriptionUpdate, ProviderUpdateOutcome},
        usage::UsageWindow,
    },
};
use dashmap::{DashMap, mapref::entry::Entry};
use uuid::Uuid;

/// Subscriptions keyed by user id (one row per user).
#[derive(Default)]
pub struct InMemorySubscriptions {
    rows: DashMap<Uuid, SubscriptionEntity>,
}

impl InMemorySubscriptions {
    pub fn get(&self, user_id: Uuid) -> Option<SubscriptionEntity> {
        self.rows.get(&user_id).map(|row| row.value().clone())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    fn user_for_external_id(&self, external_subscription_id: &str) -> Option<Uuid> {
        self.rows
            .iter()
            .find(|row| row.external_subscription_id.as_deref() == Some(external_subscription_id))
            .map(|row| *row.key())
    }

    /// Runs `apply` on the row for `external_subscription_id` when `eligible`
    /// holds and the event is not older than the row.
    fn guarded_update(
        &self,
        external_subscription_id: &str,
        event_at: DateTime<Utc>,
        eligible: impl Fn(&SubscriptionEntity) -> bool,
        apply: impl FnOnce(&mut SubscriptionEntity),
    ) -> ProviderUpdateOutcome {
        let Some(user_id) = self.user_for_external_id(external_subscription_id) else {
            return ProviderUpdateOutcome::NotFound;
        };
        let Some(mut row) = self.rows.get_mut(&user_id) else {
            return ProviderUpdateOutcome::NotFound;
        };

        if !row.accepts_event_at(event_at) {
            return ProviderUpdateOutcome::Stale;
        }
        if !eligible(row.value()) {
            return ProviderUpdateOutcome::NotFound;
        }

        apply(row.value_mut());
        row.last_event_at = Some(event_at);
        row.updated_at = Utc::now();
        ProviderUpdateOutcome::Applied
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptions {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        Ok(self.get(user_id))
    }

    async fn find_by_external_subscription_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<SubscriptionEntity>> {
        Ok(self
            .user_for_external_id(external_subscription_id)
            .and_then(|user_id| self.get(user_id)))
    }

    async fn upsert_on_checkout_completed(
        &self,
        completion: CheckoutCompletion,
    ) -> Result<SubscriptionEntity> {
        let now = Utc::now();
        let period_end = completion
            .billing_period
            .period_end(completion.event_at)
            .unwrap_or(completion.event_at);

        let mut row = self
            .rows
            .entry(completion.user_id)
            .or_insert_with(|| SubscriptionEntity {
                id: Uuid::new_v4(),
                user_id: completion.user_id,
                tier: String::new(),
                status: String::new(),
                billing_period: String::new(),
                payment_provider: "stripe".to_string(),
                external_subscription_id: None,
                customer_id: None,
                current_period_start: completion.event_at,
                current_period_end: period_end,
                cancel_at_period_end: false,
                canceled_at: None,
                trial_start: None,
                trial_end: None,
                last_event_at: None,
                created_at: now,
                updated_at: now,
            });

        if row.external_subscription_id.as_deref()
            == Some(completion.external_subscription_id.as_str())
        {
            row.customer_id = Some(completion.customer_id);
            row.updated_at = now;
            return Ok(row.clone());
        }

        row.tier = completion.tier.to_string();
        row.status = SubscriptionStatus::Active.to_string();
        row.billing_period = completion.billing_period.to_string();
        row.external_subscription_id = Some(completion.external_subscription_id);
        row.customer_id = Some(completion.customer_id);
        row.current_period_start = completion.event_at;
        row.current_period_end = period_end;
        row.cancel_at_period_end = false;
        row.canceled_at = None;
        row.trial_start = None;
        row.trial_end = None;
        row.updated_at = now;
        Ok(row.clone())
    }

    async fn apply_provider_update(
        &self,
        update: ProviderSubscriptionUpdate,
    ) -> Result<ProviderUpdateOutcome> {
        let external_subscription_id = update.external_subscription_id.clone();
        let event_at = update.event_at;

        Ok(self.guarded_update(
            &external_subscription_id,
            event_at,
            |_| true,
            |row| {
                if let Some(tier) = update.tier {
                    row.tier = tier.to_string();
                }
                if let Some(period) = update.billing_period {
                    row.billing_period = period.to_string();
                }
                row.status = update.status.to_string();
                row.cancel_at_period_end = update.cancel_at_period_end;
                if let Some(start) = update.current_period_start {
                    row.current_period_start = start;
                }
                if let Some(end) = update.current_period_end {
                    row.current_period_end = end;
                }
                row.canceled_at = update.canceled_at;
                row.trial_start = update.trial_start;
                row.trial_end = update.trial_end;
            },
        ))
    }

    async fn apply_provider_deletion(
        &self,
        external_subscription_id: &str,
        canceled_at: DateTime<Utc>,
        event_at: DateTime<Utc>,
    ) -> Result<ProviderUpdateOutcome> {
        Ok(self.guarded_update(
            external_subscription_id,
            event_at,
            |_| true,
            |row| {
                row.status = SubscriptionStatus::Canceled.to_string();
                row.canceled_at = Some(canceled_at);
                row.cancel_at_period_end = false;
            },
        ))
    }

    async fn update_status_by_external_subscription_id(
        &self,
        external_subscription_id: &str,
        from: Vec<SubscriptionStatus>,
        to: SubscriptionStatus,
        event_at: DateTime<Utc>,
    ) -> Result<ProviderUpdateOutcome> {
        Ok(self.guarded_update(
            external_subscription_id,
            event_at,
            |row| from.contains(&row.status()),
            |row| row.status = to.to_string(),
        ))
    }

    async fn set_cancel_at_period_end(
        &self,
        user_id: Uuid,
        cancel_at_period_end: bool,
        canceled_at: Option<DateTime<Utc>>,
    ) -> Result<Option<SubscriptionEntity>> {
        let Some(mut row) = self.rows.get_mut(&user_id) else {
            return Ok(None);
        };
        if row.external_subscription_id.is_none() || row.status() == SubscriptionStatus::Canceled {
            return Ok(None);
        }

        row.cancel_at_period_end = cancel_at_period_end;
        row.canceled_at = canceled_at;
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }
}

#[derive(Default)]
pub struct InMemoryReceipts {
    receipts: DashMap<String, InsertWebhookEventReceiptEntity>,
}

impl InMemoryReceipts {
    pub fn get(&self, external_event_id: &str) -> Option<InsertWebhookEventReceiptEntity> {
        self.receipts
            .get(external_event_id)
            .map(|receipt| receipt.value().clone())
    }

    pub fn len(&self) -> usize {
        self.receipts.len()
    }
}

#[async_trait]
impl WebhookEventReceiptRepository for InMemoryReceipts {
    async fn exists(&self, external_event_id: &str) -> Result<bool> {
        Ok(self.receipts.contains_key(external_event_id))
    }

    async fn record(&self, receipt: InsertWebhookEventReceiptEntity) -> Result<bool> {
        match self.receipts.entry(receipt.external_event_id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(receipt);
                Ok(true)
            }
        }
    }
}

/// Append-only ledger keyed like the unique index: provider, payment id, status.
#[derive(Default)]
pub struct InMemoryPayments {
    rows: DashMap<(String, String, String), InsertPaymentEntity>,
}

impl InMemoryPayments {
    pub fn all(&self) -> Vec<InsertPaymentEntity> {
        self.rows.iter().map(|row| row.value().clone()).collect()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPayments {
    async fn record_payment(&self, payment: InsertPaymentEntity) -> Result<bool> {
        let key = (
            payment.provider.clone(),
            payment.external_payment_id.clone(),
            payment.status.clone(),
        );
        match self.rows.entry(key) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(payment);
                Ok(true)
            }
        }
    }
}

#[derive(Default)]
pub struct InMemoryCustomers {
    refs: DashMap<(Uuid, String), String>,
}

impl InMemoryCustomers {
    pub fn get(&self, user_id: Uuid, provider: &str) -> Option<String> {
        self.refs
            .get(&(user_id, provider.to_string()))
            .map(|customer| customer.value().clone())
    }
}

#[async_trait]
impl PaymentProviderCustomerRepository for InMemoryCustomers {
    async fn find_customer_ref(&self, user_id: Uuid, provider: &str) -> Result<Option<String>> {
        Ok(self.get(user_id, provider))
    }

    async fn find_user_by_customer_ref(
        &self,
        provider: &str,
        customer_ref: &str,
    ) -> Result<Option<Uuid>> {
        Ok(self
            .refs
            .iter()
            .find(|entry| entry.key().1 == provider && entry.value() == customer_ref)
            .map(|entry| entry.key().0))
    }

    async fn insert_customer_ref(
        &self,
        user_id: Uuid,
        provider: &str,
        customer_ref: &str,
    ) -> Result<String> {
        Ok(self
            .refs
            .entry((user_id, provider.to_string()))
            .or_insert_with(|| customer_ref.to_string())
            .value()
            .clone())
    }
}

/// Usage rows keyed by (user, window start). The entry lock stands in for
/// the row lock the Postgres repository takes.
#[derive(Default)]
pub struct InMemoryUsage {
    periods: DashMap<(Uuid, DateTime<Utc>), UsagePeriodEntity>,
}

impl InMemoryUsage {
    pub fn used(&self, user_id: Uuid, period_start: DateTime<Utc>, kind: UsageKind) -> u32 {
        self.periods
            .get(&(user_id, period_start))
            .map(|period| period.used(kind))
            .unwrap_or(0)
    }
}

#[async_trait]
impl UsagePeriodRepository for InMemoryUsage {
    async fn find_period(
        &self,
        user_id: Uuid,
        period_start: DateTime<Utc>,
    ) -> Result<Option<UsagePeriodEntity>> {
        Ok(self
            .periods
            .get(&(user_id, period_start))
            .map(|period| period.value().clone()))
    }

    async fn try_consume(
        &self,
        user_id: Uuid,
        window: UsageWindow,
        kind: UsageKind,
        quota: Quota,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome> {
        let mut period = self
            .periods
            .entry((user_id, window.start))
            .or_insert_with(|| UsagePeriodEntity {
                id: Uuid::new_v4(),
                ..UsagePeriodEntity::empty(user_id, window, now)
            });

        if period.try_consume(kind, quota, now) {
            Ok(ConsumeOutcome::Consumed(period.clone()))
        } else {
            Ok(ConsumeOutcome::QuotaExceeded(period.clone()))
        }
    }
}
