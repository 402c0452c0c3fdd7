use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use backend::usecases::{
    clock::Clock,
    payment_gateway::{CheckoutRequest, PaymentGateway},
};
use chrono::{DateTime, Duration, Utc};
use crates::payments::stripe_client::{StripeSession, verify_signature_at};
use uuid::Uuid;

/// A clock tests can move forward.
pub struct SettableClock {
    now: Mutex<DateTime<Utc>>,
}

impl SettableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for SettableClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Payment provider stand-in. Verifies signatures for real and counts calls.
pub struct FakeGateway {
    webhook_secret: String,
    pub fail_calls: AtomicBool,
    pub customers_created: AtomicUsize,
    pub cancel_calls: AtomicUsize,
    pub reactivate_calls: AtomicUsize,
    pub checkout_requests: Mutex<Vec<CheckoutRequest>>,
}

impl FakeGateway {
    pub fn new(webhook_secret: &str) -> Self {
        Self {
            webhook_secret: webhook_secret.to_string(),
            fail_calls: AtomicBool::new(false),
            customers_created: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
            reactivate_calls: AtomicUsize::new(0),
            checkout_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn provider_calls(&self) -> usize {
        self.customers_created.load(Ordering::SeqCst)
            + self.cancel_calls.load(Ordering::SeqCst)
            + self.reactivate_calls.load(Ordering::SeqCst)
            + self.checkout_requests.lock().unwrap().len()
    }

    fn check_available(&self) -> Result<()> {
        if self.fail_calls.load(Ordering::SeqCst) {
            return Err(anyhow!("provider returned 503"));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_customer(
        &self,
        _user_id: Uuid,
        _email: Option<String>,
        _name: Option<String>,
    ) -> Result<String> {
        self.check_available()?;
        let n = self.customers_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("cus_fake_{n}"))
    }

    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<StripeSession> {
        self.check_available()?;
        let mut requests = self.checkout_requests.lock().unwrap();
        requests.push(request);
        let id = format!("cs_fake_{}", requests.len());
        Ok(StripeSession {
            url: format!("https://checkout.stripe.test/{id}"),
            id,
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        _return_url: &str,
    ) -> Result<StripeSession> {
        self.check_available()?;
        Ok(StripeSession {
            id: format!("bps_{customer_id}"),
            url: format!("https://billing.stripe.test/{customer_id}"),
        })
    }

    async fn cancel_at_period_end(&self, _external_subscription_id: &str) -> Result<()> {
        self.check_available()?;
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn reactivate(&self, _external_subscription_id: &str) -> Result<()> {
        self.check_available()?;
        self.reactivate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        verify_signature_at(&self.webhook_secret, payload, signature, Utc::now().timestamp())
            .is_ok()
    }
}
