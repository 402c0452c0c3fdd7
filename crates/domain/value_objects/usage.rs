use chrono::{DateTime, Datelike, Months, NaiveTime, Utc};
use serde::Serialize;

use crate::domain::{
    entities::{subscriptions::SubscriptionEntity, usage_periods::UsagePeriodEntity},
    value_objects::{
        enums::usage_kinds::UsageKind,
        feature_limits::{FeatureLimits, Quota, Remaining},
    },
};

/// Monthly accounting window a usage row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl UsageWindow {
    pub fn calendar_month(now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let first = today.with_day(1).unwrap_or(today);
        let start = first.and_time(NaiveTime::MIN).and_utc();
        let end = start
            .checked_add_months(Months::new(1))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { start, end }
    }

    /// For a paid subscription covering `now`, the month of its billing period
    /// that contains `now`; otherwise the calendar month.
    pub fn monthly(subscription: Option<&SubscriptionEntity>, now: DateTime<Utc>) -> Self {
        match subscription {
            Some(sub)
                if sub.effective_tier().is_paid()
                    && sub.current_period_start <= now
                    && now < sub.current_period_end =>
            {
                Self::anchored_month(sub.current_period_start, sub.current_period_end, now)
            }
            _ => Self::calendar_month(now),
        }
    }

    /// Steps month by month from `anchor` until the window holds `now`.
    /// Each step is taken from `anchor` itself so short months don't drift the
    /// day of month. The last window is cut at `cap`.
    pub fn anchored_month(anchor: DateTime<Utc>, cap: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let mut start = anchor;
        let mut months = 1;
        loop {
            let Some(next) = anchor.checked_add_months(Months::new(months)) else {
                return Self { start, end: cap };
            };
            if next > now || next >= cap {
                return Self {
                    start,
                    end: next.min(cap),
                };
            }
            start = next;
            months += 1;
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UsageItemDto {
    pub kind: UsageKind,
    pub used: u32,
    pub limit: Quota,
    pub remaining: Remaining,
    pub resets_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UsageSummaryDto {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub items: Vec<UsageItemDto>,
}

impl UsageSummaryDto {
    pub fn new(period: &UsagePeriodEntity, limits: &FeatureLimits) -> Self {
        let next_midnight = period
            .ai_enhancements_day
            .succ_opt()
            .map(|day| day.and_time(NaiveTime::MIN).and_utc())
            .unwrap_or(period.period_end);

        let items = UsageKind::ALL
            .into_iter()
            .map(|kind| {
                let quota = limits.quota(kind);
                let used = period.used(kind);
                UsageItemDto {
                    kind,
                    used,
                    limit: quota,
                    remaining: quota.remaining(used),
                    resets_at: if kind.is_daily() {
                        next_midnight
                    } else {
                        period.period_end
                    },
                }
            })
            .collect();

        Self {
            period_start: period.period_start,
            period_end: period.period_end,
            items,
        }
    }

    pub fn remaining(&self, kind: UsageKind) -> Option<Remaining> {
        self.items
            .iter()
            .find(|item| item.kind == kind)
            .map(|item| item.remaining)
    }
}
