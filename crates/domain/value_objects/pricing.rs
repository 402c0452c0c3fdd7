use serde::Serialize;

use crate::domain::value_objects::{
    enums::{
        billing_periods::BillingPeriod, currencies::Currency,
        subscription_tiers::SubscriptionTier,
    },
    feature_limits::FeatureLimits,
};

pub const DEFAULT_TRIAL_DAYS: u32 = 14;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Price {
    pub currency: Currency,
    pub amount_minor: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TierPricing {
    pub tier: SubscriptionTier,
    pub monthly: Vec<Price>,
    pub yearly: Vec<Price>,
    pub features: Vec<&'static str>,
    pub limits: FeatureLimits,
}

impl TierPricing {
    pub fn for_tier(tier: SubscriptionTier) -> Self {
        let (monthly, yearly) = match tier {
            SubscriptionTier::Free => ((0, 0), (0, 0)),
            SubscriptionTier::Pro => ((999, 1299), (9999, 12999)),
            SubscriptionTier::Premium => ((1999, 2699), (19999, 26999)),
        };

        Self {
            tier,
            monthly: prices(monthly),
            yearly: prices(yearly),
            features: feature_descriptions(tier).to_vec(),
            limits: FeatureLimits::for_tier(tier),
        }
    }

    pub fn catalog() -> Vec<TierPricing> {
        SubscriptionTier::ALL
            .into_iter()
            .map(TierPricing::for_tier)
            .collect()
    }

    pub fn price(&self, period: BillingPeriod, currency: Currency) -> Option<Price> {
        let prices = match period {
            BillingPeriod::Monthly => &self.monthly,
            BillingPeriod::Yearly => &self.yearly,
        };
        prices.iter().copied().find(|price| price.currency == currency)
    }
}

fn prices((usd, cad): (i32, i32)) -> Vec<Price> {
    vec![
        Price {
            currency: Currency::Usd,
            amount_minor: usd,
        },
        Price {
            currency: Currency::Cad,
            amount_minor: cad,
        },
    ]
}

fn feature_descriptions(tier: SubscriptionTier) -> &'static [&'static str] {
    match tier {
        SubscriptionTier::Free => &[
            "3 resume versions per month",
            "5 AI enhancements per day",
            "3 cover letters per month",
            "2 interview practice sessions per month",
            "Job board search",
        ],
        SubscriptionTier::Pro => &[
            "25 resume versions per month",
            "50 AI enhancements per day",
            "30 cover letters per month",
            "20 interview practice sessions per month",
            "Salary insights",
            "LinkedIn profile optimizer",
            "Unlimited application tracking",
        ],
        SubscriptionTier::Premium => &[
            "Unlimited resume versions",
            "Unlimited AI enhancements",
            "Unlimited cover letters",
            "Unlimited interview practice",
            "Salary insights and negotiation coach",
            "LinkedIn profile optimizer",
            "Unlimited application tracking",
            "Priority support",
        ],
    }
}

/// Provider price identifiers for each paid tier and billing period.
#[derive(Debug, Clone, Default)]
pub struct PriceIds {
    pub pro_monthly: Option<String>,
    pub pro_yearly: Option<String>,
    pub premium_monthly: Option<String>,
    pub premium_yearly: Option<String>,
}

impl PriceIds {
    pub fn price_id(&self, tier: SubscriptionTier, period: BillingPeriod) -> Option<&str> {
        let price = match (tier, period) {
            (SubscriptionTier::Free, _) => None,
            (SubscriptionTier::Pro, BillingPeriod::Monthly) => self.pro_monthly.as_ref(),
            (SubscriptionTier::Pro, BillingPeriod::Yearly) => self.pro_yearly.as_ref(),
            (SubscriptionTier::Premium, BillingPeriod::Monthly) => self.premium_monthly.as_ref(),
            (SubscriptionTier::Premium, BillingPeriod::Yearly) => self.premium_yearly.as_ref(),
        };
        price.map(String::as_str).filter(|value| !value.is_empty())
    }

    /// Reverse lookup used when the provider reports which price a subscription is on.
    pub fn resolve(&self, price_id: &str) -> Option<(SubscriptionTier, BillingPeriod)> {
        [SubscriptionTier::Pro, SubscriptionTier::Premium]
            .into_iter()
            .flat_map(|tier| {
                [BillingPeriod::Monthly, BillingPeriod::Yearly]
                    .into_iter()
                    .map(move |period| (tier, period))
            })
            .find(|(tier, period)| self.price_id(*tier, *period) == Some(price_id))
    }
}
