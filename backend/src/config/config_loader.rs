use anyhow::{Context, Result};
use crates::domain::value_objects::pricing::{DEFAULT_TRIAL_DAYS, PriceIds};
use url::Url;

use super::config_model::{BackendServer, Billing, Database, DotEnvyConfig, JwtSecret, Stripe};

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} is not set"))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required_url(key: &str) -> Result<String> {
    let value = required(key)?;
    Url::parse(&value).with_context(|| format!("{key} is not a valid URL"))?;
    Ok(value)
}

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
        body_limit: required("SERVER_BODY_LIMIT")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: required("SERVER_TIMEOUT")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
    };

    let trial_days = match optional("BILLING_TRIAL_DAYS") {
        Some(value) => value.parse().context("BILLING_TRIAL_DAYS is invalid")?,
        None => DEFAULT_TRIAL_DAYS,
    };

    let billing = Billing {
        price_ids: PriceIds {
            pro_monthly: optional("STRIPE_PRICE_PRO_MONTHLY"),
            pro_yearly: optional("STRIPE_PRICE_PRO_YEARLY"),
            premium_monthly: optional("STRIPE_PRICE_PREMIUM_MONTHLY"),
            premium_yearly: optional("STRIPE_PRICE_PREMIUM_YEARLY"),
        },
        success_url: required_url("BILLING_SUCCESS_URL")?,
        cancel_url: required_url("BILLING_CANCEL_URL")?,
        portal_return_url: required_url("BILLING_PORTAL_RETURN_URL")?,
        trial_days,
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        stripe,
        billing,
    })
}

pub fn get_jwt_secret() -> Result<JwtSecret> {
    dotenvy::dotenv().ok();

    Ok(JwtSecret {
        secret: required("JWT_SECRET")?,
    })
}
