use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::webhook_event_receipts;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = webhook_event_receipts)]
pub struct WebhookEventReceiptEntity {
    pub id: Uuid,
    pub external_event_id: String,
    pub event_type: String,
    pub processed_at: DateTime<Utc>,
    pub status: String,
    pub raw_payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = webhook_event_receipts)]
pub struct InsertWebhookEventReceiptEntity {
    pub external_event_id: String,
    pub event_type: String,
    pub processed_at: DateTime<Utc>,
    pub status: String,
    pub raw_payload: serde_json::Value,
}
