use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::payments::InsertPaymentEntity;

#[automock]
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Appends a payment. Returns false when the same provider payment and
    /// status is already on the ledger.
    async fn record_payment(&self, payment: InsertPaymentEntity) -> Result<bool>;
}
