use anyhow::Result;
use backend::axum_http::http_serve;
use backend::config::config_loader;
use crates::infra::db::postgres::postgres_connection;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!(error = %error, "billing backend stopped");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("backend")?;

    let config = config_loader::load()?;
    info!(
        port = config.backend_server.port,
        trial_days = config.billing.trial_days,
        "billing config loaded"
    );

    let db_pool = postgres_connection::establish_connection(&config.database.url)?;
    info!("billing database pool ready");

    http_serve::start(Arc::new(config), Arc::new(db_pool)).await
}
