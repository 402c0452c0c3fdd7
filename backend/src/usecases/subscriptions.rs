use std::{collections::HashMap, sync::Arc};

use crates::{
    domain::{
        repositories::{
            payment_provider_customers::PaymentProviderCustomerRepository,
            subscriptions::SubscriptionRepository, usage_periods::UsagePeriodRepository,
        },
        value_objects::{
            enums::{
                billing_periods::BillingPeriod, subscription_tiers::SubscriptionTier,
                usage_kinds::UsageKind,
            },
            feature_limits::{Feature, FeatureLimits},
            pricing::{PriceIds, TierPricing},
            subscriptions::{
                CheckoutSessionDto, EntitlementDto, FeatureCheckDto, PortalSessionDto,
                SubscriptionView, UsageRecordedDto,
            },
            usage::UsageSummaryDto,
        },
    },
    infra::db::repositories::subscriptions::STRIPE_PROVIDER,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::usecases::{
    clock::Clock,
    errors::{BillingError, BillingResult},
    payment_gateway::{CheckoutRequest, PaymentGateway},
    subscription_store::SubscriptionStore,
    usage_ledger::UsageLedgerUseCase,
};

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub price_ids: PriceIds,
    pub success_url: String,
    pub cancel_url: String,
    pub portal_return_url: String,
    pub trial_days: u32,
}

/// Entry point other subsystems use for entitlements, checkout and
/// cancellation.
pub struct SubscriptionUseCase<S, U, Cust, G>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    U: UsagePeriodRepository + Send + Sync + 'static,
    Cust: PaymentProviderCustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    store: SubscriptionStore<S>,
    ledger: UsageLedgerUseCase<U, S>,
    customer_repo: Arc<Cust>,
    gateway: Arc<G>,
    settings: CheckoutSettings,
    clock: Arc<dyn Clock>,
}

impl<S, U, Cust, G> SubscriptionUseCase<S, U, Cust, G>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    U: UsagePeriodRepository + Send + Sync + 'static,
    Cust: PaymentProviderCustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(
        subscription_repo: Arc<S>,
        usage_repo: Arc<U>,
        customer_repo: Arc<Cust>,
        gateway: Arc<G>,
        settings: CheckoutSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store: SubscriptionStore::new(Arc::clone(&subscription_repo)),
            ledger: UsageLedgerUseCase::new(usage_repo, subscription_repo, Arc::clone(&clock)),
            customer_repo,
            gateway,
            settings,
            clock,
        }
    }

    pub fn list_plans(&self) -> Vec<TierPricing> {
        TierPricing::catalog()
    }

    pub async fn get_entitlement(&self, user_id: Uuid) -> BillingResult<EntitlementDto> {
        let subscription = self.store.get_or_create_default(user_id).await?;
        let limits = FeatureLimits::for_tier(subscription.effective_tier);
        let usage = self.ledger.get_current_usage(user_id).await?;

        Ok(EntitlementDto {
            usage: UsageSummaryDto::new(&usage, &limits),
            subscription,
            limits,
        })
    }

    pub async fn start_checkout(
        &self,
        user_id: Uuid,
        email: Option<String>,
        name: Option<String>,
        tier: &str,
        billing_period: &str,
    ) -> BillingResult<CheckoutSessionDto> {
        info!(%user_id, %tier, %billing_period, "subscriptions: checkout requested");

        let tier = match SubscriptionTier::from_str(tier) {
            Some(tier) if tier.is_paid() => tier,
            _ => {
                let err = BillingError::InvalidTier(tier.to_string());
                warn!(
                    %user_id,
                    status = err.status_code().as_u16(),
                    "subscriptions: checkout rejected for tier"
                );
                return Err(err);
            }
        };
        let period = BillingPeriod::from_str(billing_period)
            .ok_or_else(|| BillingError::InvalidBillingPeriod(billing_period.to_string()))?;

        let price_id = self
            .settings
            .price_ids
            .price_id(tier, period)
            .ok_or_else(|| {
                let err = BillingError::PricingNotConfigured { tier, period };
                error!(
                    %user_id,
                    %tier,
                    %period,
                    status = err.status_code().as_u16(),
                    "subscriptions: no price id configured"
                );
                err
            })?
            .to_string();

        let customer_id = self.resolve_customer(user_id, email, name).await?;

        let metadata = HashMap::from([
            ("user_id".to_string(), user_id.to_string()),
            ("tier".to_string(), tier.to_string()),
            ("billing_period".to_string(), period.to_string()),
        ]);

        let session = self
            .gateway
            .create_checkout_session(CheckoutRequest {
                user_id,
                customer_id,
                price_id,
                success_url: self.settings.success_url.clone(),
                cancel_url: self.settings.cancel_url.clone(),
                trial_days: self.settings.trial_days,
                metadata,
            })
            .await
            .map_err(|err| {
                error!(%user_id, error = ?err, "subscriptions: checkout session creation failed");
                BillingError::ProviderUnavailable(err)
            })?;

        info!(%user_id, session_id = %session.id, "subscriptions: checkout session created");
        Ok(CheckoutSessionDto {
            session_id: session.id,
            checkout_url: session.url,
        })
    }

    /// Stored provider customer, or a new one created at the provider and
    /// then recorded locally.
    async fn resolve_customer(
        &self,
        user_id: Uuid,
        email: Option<String>,
        name: Option<String>,
    ) -> BillingResult<String> {
        let existing = self
            .customer_repo
            .find_customer_ref(user_id, STRIPE_PROVIDER)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: customer lookup failed");
                BillingError::Internal(err)
            })?;
        if let Some(customer_id) = existing {
            return Ok(customer_id);
        }

        let created = self
            .gateway
            .create_customer(user_id, email, name)
            .await
            .map_err(|err| {
                error!(%user_id, error = ?err, "subscriptions: provider customer creation failed");
                BillingError::ProviderUnavailable(err)
            })?;

        let stored = self
            .customer_repo
            .insert_customer_ref(user_id, STRIPE_PROVIDER, &created)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to store customer");
                BillingError::Internal(err)
            })?;

        info!(%user_id, customer_id = %stored, "subscriptions: provider customer created");
        Ok(stored)
    }

    pub async fn open_billing_portal(&self, user_id: Uuid) -> BillingResult<PortalSessionDto> {
        let customer_id = self
            .customer_repo
            .find_customer_ref(user_id, STRIPE_PROVIDER)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: customer lookup failed");
                BillingError::Internal(err)
            })?
            .ok_or_else(|| {
                let err = BillingError::NoSubscription;
                warn!(
                    %user_id,
                    status = err.status_code().as_u16(),
                    "subscriptions: portal requested without provider customer"
                );
                err
            })?;

        let session = self
            .gateway
            .create_portal_session(&customer_id, &self.settings.portal_return_url)
            .await
            .map_err(|err| {
                error!(%user_id, error = ?err, "subscriptions: portal session creation failed");
                BillingError::ProviderUnavailable(err)
            })?;

        Ok(PortalSessionDto {
            portal_url: session.url,
        })
    }

    pub async fn cancel_at_period_end(&self, user_id: Uuid) -> BillingResult<SubscriptionView> {
        let external_subscription_id = self.store.require_active_external_id(user_id).await?;

        self.gateway
            .cancel_at_period_end(&external_subscription_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %external_subscription_id,
                    error = ?err,
                    "subscriptions: provider cancellation failed"
                );
                BillingError::ProviderUnavailable(err)
            })?;

        let updated = self
            .store
            .set_cancel_at_period_end(user_id, true, self.clock.now())
            .await?;
        info!(%user_id, %external_subscription_id, "subscriptions: cancellation scheduled");
        Ok(SubscriptionView::from(updated))
    }

    pub async fn reactivate(&self, user_id: Uuid) -> BillingResult<SubscriptionView> {
        let external_subscription_id = self.store.require_active_external_id(user_id).await?;

        self.gateway
            .reactivate(&external_subscription_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %external_subscription_id,
                    error = ?err,
                    "subscriptions: provider reactivation failed"
                );
                BillingError::ProviderUnavailable(err)
            })?;

        let updated = self
            .store
            .clear_cancellation(user_id, self.clock.now())
            .await?;
        info!(%user_id, %external_subscription_id, "subscriptions: cancellation withdrawn");
        Ok(SubscriptionView::from(updated))
    }

    pub async fn check_feature(
        &self,
        user_id: Uuid,
        feature_name: &str,
    ) -> BillingResult<FeatureCheckDto> {
        let feature = Feature::from_str(feature_name)
            .ok_or_else(|| BillingError::UnknownFeature(feature_name.to_string()))?;
        let tier = self.store.get_or_create_default(user_id).await?.effective_tier;
        let limits = FeatureLimits::for_tier(tier);

        if let Some(available) = feature.flag(&limits) {
            return Ok(FeatureCheckDto {
                feature,
                available,
                required_tier: feature.minimum_tier(),
                remaining: None,
            });
        }

        let Some(kind) = feature.usage_kind() else {
            return Err(BillingError::UnknownFeature(feature_name.to_string()));
        };
        let remaining = self.ledger.remaining(user_id, tier, kind).await?;
        let available = !remaining.is_exhausted();
        let required_tier = if available {
            feature.minimum_tier()
        } else {
            FeatureLimits::tier_lifting_quota(kind, tier).unwrap_or(tier)
        };

        Ok(FeatureCheckDto {
            feature,
            available,
            required_tier,
            remaining: Some(remaining),
        })
    }

    pub async fn record_usage(
        &self,
        user_id: Uuid,
        kind: UsageKind,
    ) -> BillingResult<UsageRecordedDto> {
        self.ledger.record_usage(user_id, kind).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::{clock::SystemClock, payment_gateway::MockPaymentGateway};
    use chrono::{Duration, Utc};
    use crates::{
        domain::{
            entities::subscriptions::SubscriptionEntity,
            repositories::{
                payment_provider_customers::MockPaymentProviderCustomerRepository,
                subscriptions::MockSubscriptionRepository,
                usage_periods::MockUsagePeriodRepository,
            },
            value_objects::enums::subscription_statuses::SubscriptionStatus,
        },
        payments::stripe_client::StripeSession,
    };
    use mockall::predicate::eq;

    type TestUseCase = SubscriptionUseCase<
        MockSubscriptionRepository,
        MockUsagePeriodRepository,
        MockPaymentProviderCustomerRepository,
        MockPaymentGateway,
    >;

    fn settings() -> CheckoutSettings {
        CheckoutSettings {
            price_ids: PriceIds {
                pro_monthly: Some("price_pro_m".to_string()),
                ..PriceIds::default()
            },
            success_url: "https://app.example.com/billing/success".to_string(),
            cancel_url: "https://app.example.com/billing/cancel".to_string(),
            portal_return_url: "https://app.example.com/settings".to_string(),
            trial_days: 14,
        }
    }

    fn usecase(
        subscription_repo: MockSubscriptionRepository,
        customer_repo: MockPaymentProviderCustomerRepository,
        gateway: MockPaymentGateway,
    ) -> TestUseCase {
        SubscriptionUseCase::new(
            Arc::new(subscription_repo),
            Arc::new(MockUsagePeriodRepository::new()),
            Arc::new(customer_repo),
            Arc::new(gateway),
            settings(),
            Arc::new(SystemClock),
        )
    }

    fn active_pro(user_id: Uuid) -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id,
            tier: "pro".to_string(),
            status: SubscriptionStatus::Active.to_string(),
            billing_period: "monthly".to_string(),
            payment_provider: "stripe".to_string(),
            external_subscription_id: Some("sub_pro".to_string()),
            customer_id: Some("cus_pro".to_string()),
            current_period_start: now - Duration::days(1),
            current_period_end: now + Duration::days(29),
            cancel_at_period_end: false,
            canceled_at: None,
            trial_start: None,
            trial_end: None,
            last_event_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn free_tier_checkout_never_reaches_the_provider() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_customer().times(0);
        gateway.expect_create_checkout_session().times(0);

        let result = usecase(
            MockSubscriptionRepository::new(),
            MockPaymentProviderCustomerRepository::new(),
            gateway,
        )
        .start_checkout(Uuid::new_v4(), None, None, "FREE", "MONTHLY")
        .await;

        assert!(matches!(result, Err(BillingError::InvalidTier(_))));
    }

    #[tokio::test]
    async fn missing_price_id_is_reported_before_any_provider_call() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_customer().times(0);
        let mut customer_repo = MockPaymentProviderCustomerRepository::new();
        customer_repo.expect_find_customer_ref().times(0);

        let result = usecase(MockSubscriptionRepository::new(), customer_repo, gateway)
            .start_checkout(Uuid::new_v4(), None, None, "premium", "yearly")
            .await;

        assert!(matches!(
            result,
            Err(BillingError::PricingNotConfigured {
                tier: SubscriptionTier::Premium,
                period: BillingPeriod::Yearly,
            })
        ));
    }

    #[tokio::test]
    async fn checkout_reuses_stored_customer_and_requests_trial() {
        let user_id = Uuid::new_v4();
        let mut customer_repo = MockPaymentProviderCustomerRepository::new();
        customer_repo
            .expect_find_customer_ref()
            .with(eq(user_id), eq(STRIPE_PROVIDER))
            .returning(|_, _| Ok(Some("cus_existing".to_string())));
        customer_repo.expect_insert_customer_ref().times(0);

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_customer().times(0);
        gateway
            .expect_create_checkout_session()
            .withf(move |request| {
                request.customer_id == "cus_existing"
                    && request.price_id == "price_pro_m"
                    && request.trial_days == 14
                    && request.metadata.get("tier").map(String::as_str) == Some("pro")
                    && request.metadata.get("user_id") == Some(&user_id.to_string())
            })
            .times(1)
            .returning(|_| {
                Ok(StripeSession {
                    id: "cs_1".to_string(),
                    url: "https://checkout.stripe.com/c/cs_1".to_string(),
                })
            });

        let dto = usecase(MockSubscriptionRepository::new(), customer_repo, gateway)
            .start_checkout(user_id, None, None, "pro", "monthly")
            .await
            .unwrap();

        assert_eq!(dto.session_id, "cs_1");
    }

    #[tokio::test]
    async fn provider_failure_on_customer_creation_writes_nothing() {
        let mut customer_repo = MockPaymentProviderCustomerRepository::new();
        customer_repo
            .expect_find_customer_ref()
            .returning(|_, _| Ok(None));
        customer_repo.expect_insert_customer_ref().times(0);

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_customer()
            .returning(|_, _, _| Err(anyhow::anyhow!("stripe timed out")));
        gateway.expect_create_checkout_session().times(0);

        let result = usecase(MockSubscriptionRepository::new(), customer_repo, gateway)
            .start_checkout(Uuid::new_v4(), Some("a@b.c".to_string()), None, "pro", "monthly")
            .await;

        assert!(matches!(result, Err(BillingError::ProviderUnavailable(_))));
    }

    #[tokio::test]
    async fn portal_without_customer_is_no_subscription() {
        let mut customer_repo = MockPaymentProviderCustomerRepository::new();
        customer_repo
            .expect_find_customer_ref()
            .returning(|_, _| Ok(None));
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_portal_session().times(0);

        let result = usecase(MockSubscriptionRepository::new(), customer_repo, gateway)
            .open_billing_portal(Uuid::new_v4())
            .await;

        assert!(matches!(result, Err(BillingError::NoSubscription)));
    }

    #[tokio::test]
    async fn failed_provider_cancel_leaves_local_flag_alone() {
        let user_id = Uuid::new_v4();
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_user_id()
            .returning(move |user_id| Ok(Some(active_pro(user_id))));
        subscription_repo.expect_set_cancel_at_period_end().times(0);

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_cancel_at_period_end()
            .with(eq("sub_pro"))
            .returning(|_| Err(anyhow::anyhow!("502 from provider")));

        let result = usecase(
            subscription_repo,
            MockPaymentProviderCustomerRepository::new(),
            gateway,
        )
        .cancel_at_period_end(user_id)
        .await;

        assert!(matches!(result, Err(BillingError::ProviderUnavailable(_))));
    }

    #[tokio::test]
    async fn free_user_lacks_pro_flag_feature() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_user_id()
            .returning(|_| Ok(None));

        let check = usecase(
            subscription_repo,
            MockPaymentProviderCustomerRepository::new(),
            MockPaymentGateway::new(),
        )
        .check_feature(Uuid::new_v4(), "salary_insights")
        .await
        .unwrap();

        assert!(!check.available);
        assert_eq!(check.required_tier, SubscriptionTier::Pro);
        assert_eq!(check.remaining, None);
    }

    #[tokio::test]
    async fn unknown_feature_is_rejected() {
        let result = usecase(
            MockSubscriptionRepository::new(),
            MockPaymentProviderCustomerRepository::new(),
            MockPaymentGateway::new(),
        )
        .check_feature(Uuid::new_v4(), "time_travel")
        .await;

        assert!(matches!(result, Err(BillingError::UnknownFeature(name)) if name == "time_travel"));
    }
}
