mod common;

use std::sync::Arc;

use backend::usecases::errors::BillingError;
use chrono::{Duration, TimeZone, Utc};
use common::*;
use crates::domain::value_objects::{
    enums::{subscription_tiers::SubscriptionTier, usage_kinds::UsageKind},
    feature_limits::{Quota, Remaining},
};
use uuid::Uuid;

fn mid_month_app() -> TestApp {
    TestApp::new(Utc.with_ymd_and_hms(2026, 5, 14, 10, 0, 0).unwrap())
}

async fn ai_remaining(app: &TestApp, user_id: Uuid) -> Option<Remaining> {
    app.service
        .get_entitlement(user_id)
        .await
        .unwrap()
        .usage
        .remaining(UsageKind::AiEnhancement)
}

#[tokio::test]
async fn free_ai_quota_is_five_per_day_and_resets_at_midnight() {
    let app = mid_month_app();
    let user_id = Uuid::new_v4();

    for expected_left in (0..5).rev() {
        let recorded = app
            .service
            .record_usage(user_id, UsageKind::AiEnhancement)
            .await
            .unwrap();
        assert_eq!(recorded.remaining, Remaining::Finite(expected_left));
    }

    match app
        .service
        .record_usage(user_id, UsageKind::AiEnhancement)
        .await
    {
        Err(BillingError::QuotaExceeded {
            remaining,
            limit,
            required_tier,
            ..
        }) => {
            assert_eq!(remaining, Remaining::Finite(0));
            assert_eq!(limit, Quota::Limited(5));
            assert_eq!(required_tier, Some(SubscriptionTier::Pro));
        }
        other => panic!("expected quota exceeded, got {other:?}"),
    }
    assert_eq!(ai_remaining(&app, user_id).await, Some(Remaining::Finite(0)));

    app.clock.advance(Duration::hours(14));
    assert_eq!(ai_remaining(&app, user_id).await, Some(Remaining::Finite(5)));
    assert!(
        app.service
            .record_usage(user_id, UsageKind::AiEnhancement)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn monthly_counters_start_over_in_the_next_window() {
    let app = mid_month_app();
    let user_id = Uuid::new_v4();

    for _ in 0..3 {
        app.service
            .record_usage(user_id, UsageKind::CoverLetter)
            .await
            .unwrap();
    }
    assert!(
        app.service
            .record_usage(user_id, UsageKind::CoverLetter)
            .await
            .is_err()
    );

    app.clock
        .set(Utc.with_ymd_and_hms(2026, 6, 1, 0, 30, 0).unwrap());
    let recorded = app
        .service
        .record_usage(user_id, UsageKind::CoverLetter)
        .await
        .unwrap();
    assert_eq!(recorded.remaining, Remaining::Finite(2));
}

#[tokio::test]
async fn daily_and_monthly_counters_are_independent() {
    let app = mid_month_app();
    let user_id = Uuid::new_v4();

    app.service
        .record_usage(user_id, UsageKind::ResumeVersion)
        .await
        .unwrap();
    for _ in 0..5 {
        app.service
            .record_usage(user_id, UsageKind::AiEnhancement)
            .await
            .unwrap();
    }

    let entitlement = app.service.get_entitlement(user_id).await.unwrap();
    assert_eq!(
        entitlement.usage.remaining(UsageKind::ResumeVersion),
        Some(Remaining::Finite(2))
    );
    assert_eq!(
        entitlement.usage.remaining(UsageKind::InterviewSession),
        Some(Remaining::Finite(2))
    );
    assert_eq!(
        entitlement.usage.remaining(UsageKind::AiEnhancement),
        Some(Remaining::Finite(0))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_usage_never_passes_the_limit() {
    let app = Arc::new(mid_month_app());
    let user_id = Uuid::new_v4();

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let app = Arc::clone(&app);
            tokio::spawn(async move {
                app.service
                    .record_usage(user_id, UsageKind::InterviewSession)
                    .await
                    .is_ok()
            })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 2);
    let window_start = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
    assert_eq!(
        app.usage.used(user_id, window_start, UsageKind::InterviewSession),
        2
    );
}

#[tokio::test]
async fn premium_usage_is_unbounded() {
    let now = Utc.with_ymd_and_hms(2026, 5, 14, 10, 0, 0).unwrap();
    let app = TestApp::new(now);
    let user_id = Uuid::new_v4();
    app.deliver(&checkout_completed(
        "evt_premium",
        now.timestamp() - 60,
        user_id,
        "sub_premium",
        "cus_premium",
        "premium",
    ))
    .await
    .unwrap();

    for _ in 0..60 {
        let recorded = app
            .service
            .record_usage(user_id, UsageKind::AiEnhancement)
            .await
            .unwrap();
        assert_eq!(recorded.remaining, Remaining::Unbounded);
    }
}

#[tokio::test]
async fn yearly_subscription_still_resets_monthly_quotas_every_month() {
    let now = Utc.with_ymd_and_hms(2026, 5, 14, 10, 0, 0).unwrap();
    let app = TestApp::new(now);
    let user_id = Uuid::new_v4();
    let signed = now.timestamp() - 60;
    app.deliver(&checkout_completed(
        "evt_yearly_checkout",
        signed - 60,
        user_id,
        "sub_yearly",
        "cus_yearly",
        "pro",
    ))
    .await
    .unwrap();
    let mut yearly = subscription_updated(
        "evt_yearly_update",
        signed,
        "sub_yearly",
        "active",
        "price_pro_yearly",
        false,
    );
    yearly["data"]["object"]["current_period_start"] = serde_json::json!(signed);
    yearly["data"]["object"]["current_period_end"] = serde_json::json!(signed + 365 * 86_400);
    app.deliver(&yearly).await.unwrap();

    for _ in 0..30 {
        app.service
            .record_usage(user_id, UsageKind::CoverLetter)
            .await
            .unwrap();
    }
    assert!(matches!(
        app.service
            .record_usage(user_id, UsageKind::CoverLetter)
            .await,
        Err(BillingError::QuotaExceeded { .. })
    ));

    app.clock.advance(Duration::days(45));
    let recorded = app
        .service
        .record_usage(user_id, UsageKind::CoverLetter)
        .await
        .unwrap();
    assert_eq!(recorded.remaining, Remaining::Finite(29));
}
