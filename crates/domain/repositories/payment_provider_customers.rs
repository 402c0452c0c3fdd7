use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

#[automock]
#[async_trait]
pub trait PaymentProviderCustomerRepository: Send + Sync {
    async fn find_customer_ref(&self, user_id: Uuid, provider: &str) -> Result<Option<String>>;

    async fn find_user_by_customer_ref(
        &self,
        provider: &str,
        customer_ref: &str,
    ) -> Result<Option<Uuid>>;

    /// Stores the reference unless the user already has one for `provider`,
    /// and returns whichever reference is stored afterwards.
    async fn insert_customer_ref(
        &self,
        user_id: Uuid,
        provider: &str,
        customer_ref: &str,
    ) -> Result<String>;
}
