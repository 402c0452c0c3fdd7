use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use crates::domain::{
    repositories::{
        payment_provider_customers::PaymentProviderCustomerRepository,
        subscriptions::SubscriptionRepository, usage_periods::UsagePeriodRepository,
    },
    value_objects::{enums::usage_kinds::UsageKind, subscriptions::CreateCheckoutRequest},
};
use tracing::info;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::ErrorResponse,
    usecases::{payment_gateway::PaymentGateway, subscriptions::SubscriptionUseCase},
};

type UseCaseState<S, U, C, G> = State<Arc<SubscriptionUseCase<S, U, C, G>>>;

pub fn routes<S, U, C, G>(subscriptions_usecase: Arc<SubscriptionUseCase<S, U, C, G>>) -> Router
where
    S: SubscriptionRepository + Send + Sync + 'static,
    U: UsagePeriodRepository + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/plans", get(list_plans))
        .route("/entitlement", get(get_entitlement))
        .route("/checkout", post(start_checkout))
        .route("/portal", post(open_billing_portal))
        .route("/cancel", post(cancel_at_period_end))
        .route("/reactivate", post(reactivate))
        .route("/features/:name", get(check_feature))
        .route("/usage/:kind", post(record_usage))
        .with_state(subscriptions_usecase)
}

pub async fn list_plans<S, U, C, G>(
    State(subscriptions_usecase): UseCaseState<S, U, C, G>,
    _auth: AuthUser,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    U: UsagePeriodRepository + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    Json(subscriptions_usecase.list_plans()).into_response()
}

pub async fn get_entitlement<S, U, C, G>(
    State(subscriptions_usecase): UseCaseState<S, U, C, G>,
    auth: AuthUser,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    U: UsagePeriodRepository + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    match subscriptions_usecase.get_entitlement(auth.user_id).await {
        Ok(entitlement) => Json(entitlement).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn start_checkout<S, U, C, G>(
    State(subscriptions_usecase): UseCaseState<S, U, C, G>,
    auth: AuthUser,
    Json(request): Json<CreateCheckoutRequest>,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    U: UsagePeriodRepository + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    match subscriptions_usecase
        .start_checkout(
            auth.user_id,
            auth.email,
            auth.name,
            &request.tier,
            &request.billing_period,
        )
        .await
    {
        Ok(session) => Json(session).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn open_billing_portal<S, U, C, G>(
    State(subscriptions_usecase): UseCaseState<S, U, C, G>,
    auth: AuthUser,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    U: UsagePeriodRepository + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    match subscriptions_usecase.open_billing_portal(auth.user_id).await {
        Ok(portal) => Json(portal).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn cancel_at_period_end<S, U, C, G>(
    State(subscriptions_usecase): UseCaseState<S, U, C, G>,
    auth: AuthUser,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    U: UsagePeriodRepository + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    match subscriptions_usecase.cancel_at_period_end(auth.user_id).await {
        Ok(subscription) => Json(subscription).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn reactivate<S, U, C, G>(
    State(subscriptions_usecase): UseCaseState<S, U, C, G>,
    auth: AuthUser,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    U: UsagePeriodRepository + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    match subscriptions_usecase.reactivate(auth.user_id).await {
        Ok(subscription) => Json(subscription).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn check_feature<S, U, C, G>(
    State(subscriptions_usecase): UseCaseState<S, U, C, G>,
    auth: AuthUser,
    Path(name): Path<String>,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    U: UsagePeriodRepository + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    match subscriptions_usecase.check_feature(auth.user_id, &name).await {
        Ok(check) => Json(check).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn record_usage<S, U, C, G>(
    State(subscriptions_usecase): UseCaseState<S, U, C, G>,
    auth: AuthUser,
    Path(kind): Path<String>,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    U: UsagePeriodRepository + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    let Some(kind) = UsageKind::from_str(&kind) else {
        info!(user_id = %auth.user_id, %kind, "subscriptions router: unknown usage kind");
        let body = ErrorResponse {
            code: StatusCode::BAD_REQUEST.as_u16(),
            message: format!("unknown usage kind: {kind}"),
            quota: None,
        };
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    };

    match subscriptions_usecase.record_usage(auth.user_id, kind).await {
        Ok(recorded) => Json(recorded).into_response(),
        Err(err) => err.into_response(),
    }
}
