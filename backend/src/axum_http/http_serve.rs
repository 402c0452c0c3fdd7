use crate::{
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
    usecases::{
        billing_webhook::BillingWebhookUseCase,
        clock::{Clock, SystemClock},
        subscriptions::{CheckoutSettings, SubscriptionUseCase},
    },
};
use anyhow::Result;
use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::{
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            payment_provider_customers::PaymentProviderCustomerPostgres,
            payments::PaymentPostgres, subscriptions::SubscriptionPostgres,
            usage_periods::UsagePeriodPostgres,
            webhook_event_receipts::WebhookEventReceiptPostgres,
        },
    },
    payments::stripe_client::StripeClient,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let subscription_repo = Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool)));
    let customer_repo = Arc::new(PaymentProviderCustomerPostgres::new(Arc::clone(&db_pool)));
    let stripe_client = Arc::new(StripeClient::new(
        config.stripe.secret_key.clone(),
        config.stripe.webhook_secret.clone(),
    ));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let subscriptions_usecase = SubscriptionUseCase::new(
        Arc::clone(&subscription_repo),
        Arc::new(UsagePeriodPostgres::new(Arc::clone(&db_pool))),
        Arc::clone(&customer_repo),
        Arc::clone(&stripe_client),
        CheckoutSettings {
            price_ids: config.billing.price_ids.clone(),
            success_url: config.billing.success_url.clone(),
            cancel_url: config.billing.cancel_url.clone(),
            portal_return_url: config.billing.portal_return_url.clone(),
            trial_days: config.billing.trial_days,
        },
        Arc::clone(&clock),
    );

    let webhook_usecase = BillingWebhookUseCase::new(
        subscription_repo,
        Arc::new(WebhookEventReceiptPostgres::new(Arc::clone(&db_pool))),
        Arc::new(PaymentPostgres::new(Arc::clone(&db_pool))),
        customer_repo,
        stripe_client,
        config.billing.price_ids.clone(),
        clock,
    );

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/api/v1/subscriptions",
            routers::subscriptions::routes(Arc::new(subscriptions_usecase)),
        )
        .nest(
            "/api/v1/billing",
            routers::billing_webhook::routes(Arc::new(webhook_usecase)),
        )
        .route("/api/v1/health-check", get(default_routers::health_check))
        .route("/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
