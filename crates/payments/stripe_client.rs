use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{error, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Maximum age (either direction) of a signed webhook timestamp, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: u64 = 300;

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
}

/// A hosted Stripe page (checkout or billing portal).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StripeSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutSessionParams<'a> {
    pub customer_id: &'a str,
    pub price_id: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
    pub trial_days: u32,
    pub client_reference_id: Uuid,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: String, webhook_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            webhook_secret,
        }
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            stripe_error_message = ?details.as_ref().and_then(|d| d.message.as_deref()),
            context = %context,
            "stripe api request failed"
        );

        anyhow::bail!(
            "Stripe API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    async fn post_form(
        &self,
        path: &str,
        body: &[(String, String)],
        context: &str,
    ) -> Result<reqwest::Response> {
        let resp = self
            .http
            .post(format!("{STRIPE_API_BASE}{path}"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(body)
            .send()
            .await
            .with_context(|| format!("stripe request failed: {context}"))?;

        Self::ensure_success(resp, context).await
    }

    /// https://stripe.com/docs/api/customers/create
    pub async fn create_customer(
        &self,
        user_id: Uuid,
        email: Option<&str>,
        name: Option<&str>,
    ) -> Result<String> {
        let mut body = vec![("metadata[user_id]".to_string(), user_id.to_string())];
        if let Some(email) = email {
            body.push(("email".to_string(), email.to_string()));
        }
        if let Some(name) = name {
            body.push(("name".to_string(), name.to_string()));
        }

        let resp = self
            .post_form("/customers", &body, "create customer")
            .await?;

        #[derive(Deserialize)]
        struct CustomerResp {
            id: String,
        }

        let parsed: CustomerResp = resp.json().await?;
        Ok(parsed.id)
    }

    /// Creates a subscription-mode Checkout Session.
    /// https://stripe.com/docs/api/checkout/sessions/create
    pub async fn create_checkout_session(
        &self,
        params: CheckoutSessionParams<'_>,
    ) -> Result<StripeSession> {
        let mut body: Vec<(String, String)> = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("customer".to_string(), params.customer_id.to_string()),
            ("line_items[0][price]".to_string(), params.price_id.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), params.success_url.to_string()),
            ("cancel_url".to_string(), params.cancel_url.to_string()),
            (
                "client_reference_id".to_string(),
                params.client_reference_id.to_string(),
            ),
        ];

        if params.trial_days > 0 {
            body.push((
                "subscription_data[trial_period_days]".to_string(),
                params.trial_days.to_string(),
            ));
        }

        // Copied onto the subscription too, so later subscription events carry it.
        for (key, value) in params.metadata {
            body.push((format!("subscription_data[metadata][{key}]"), value.clone()));
            body.push((format!("metadata[{key}]"), value));
        }

        let resp = self
            .post_form("/checkout/sessions", &body, "create checkout session")
            .await?;

        #[derive(Deserialize)]
        struct CheckoutResp {
            id: String,
            url: Option<String>,
        }

        let parsed: CheckoutResp = resp.json().await?;
        let url = parsed
            .url
            .ok_or_else(|| anyhow::anyhow!("Stripe Checkout session URL is missing"))?;

        Ok(StripeSession { id: parsed.id, url })
    }

    /// https://stripe.com/docs/api/customer_portal/sessions/create
    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<StripeSession> {
        let body = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];

        let resp = self
            .post_form("/billing_portal/sessions", &body, "create portal session")
            .await?;

        let session: StripeSession = resp.json().await?;
        Ok(session)
    }

    /// Schedules (or with `false`, withdraws) cancellation at the end of the
    /// current period.
    pub async fn set_cancel_at_period_end(
        &self,
        external_subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<()> {
        let body = vec![(
            "cancel_at_period_end".to_string(),
            cancel_at_period_end.to_string(),
        )];

        self.post_form(
            &format!("/subscriptions/{external_subscription_id}"),
            &body,
            "update subscription cancellation",
        )
        .await?;

        Ok(())
    }

    /// Verifies a `Stripe-Signature` header against the current time.
    /// https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_signature(&self, payload: &[u8], signature_header: &str) -> bool {
        match verify_signature_at(
            &self.webhook_secret,
            payload,
            signature_header,
            Utc::now().timestamp(),
        ) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "stripe webhook signature rejected");
                false
            }
        }
    }
}

/// Checks `t=<unix>,v1=<hex>` against HMAC-SHA256 of `"{t}.{payload}"`.
/// Any of several `v1` entries may match (secret rotation).
pub fn verify_signature_at(
    secret: &str,
    payload: &[u8],
    signature_header: &str,
    now: i64,
) -> Result<()> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| anyhow::anyhow!("missing timestamp in stripe-signature"))?;
    if signatures.is_empty() {
        anyhow::bail!("missing v1 in stripe-signature");
    }

    let signed_at: i64 = timestamp
        .parse()
        .context("invalid timestamp in stripe-signature")?;
    if now.abs_diff(signed_at) > SIGNATURE_TOLERANCE_SECS {
        anyhow::bail!("stripe-signature timestamp outside tolerance");
    }

    let matched = signatures.iter().any(|signature| {
        let Ok(provided) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&provided).is_ok()
    });

    if !matched {
        anyhow::bail!("invalid webhook signature");
    }

    Ok(())
}

/// Builds a header in the format Stripe sends, for local tooling and tests.
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let signature = hex::encode(mac.finalize().into_bytes());
    Ok(format!("t={timestamp},v1={signature}"))
}
