use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::webhook_event_receipts::InsertWebhookEventReceiptEntity;

#[automock]
#[async_trait]
pub trait WebhookEventReceiptRepository: Send + Sync {
    async fn exists(&self, external_event_id: &str) -> Result<bool>;

    /// Returns false when a receipt for the same event id was written first
    /// by a concurrent delivery.
    async fn record(&self, receipt: InsertWebhookEventReceiptEntity) -> Result<bool>;
}
