use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, dsl::exists, insert_into, prelude::*, select};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::webhook_event_receipts},
};
use domain::{
    entities::webhook_event_receipts::InsertWebhookEventReceiptEntity,
    repositories::webhook_event_receipts::WebhookEventReceiptRepository,
};

pub struct WebhookEventReceiptPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl WebhookEventReceiptPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl WebhookEventReceiptRepository for WebhookEventReceiptPostgres {
    async fn exists(&self, external_event_id: &str) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let found = select(exists(
            webhook_event_receipts::table
                .filter(webhook_event_receipts::external_event_id.eq(external_event_id)),
        ))
        .get_result::<bool>(&mut conn)?;

        Ok(found)
    }

    async fn record(&self, receipt: InsertWebhookEventReceiptEntity) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let inserted = insert_into(webhook_event_receipts::table)
            .values(&receipt)
            .on_conflict(webhook_event_receipts::external_event_id)
            .do_nothing()
            .execute(&mut conn)?;

        Ok(inserted > 0)
    }
}
