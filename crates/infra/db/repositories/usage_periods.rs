use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::usage_periods},
};
use domain::{
    entities::usage_periods::{InsertUsagePeriodEntity, UsageCountersChangeset, UsagePeriodEntity},
    repositories::usage_periods::{ConsumeOutcome, UsagePeriodRepository},
    value_objects::{enums::usage_kinds::UsageKind, feature_limits::Quota, usage::UsageWindow},
};

pub struct UsagePeriodPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UsagePeriodPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UsagePeriodRepository for UsagePeriodPostgres {
    async fn find_period(
        &self,
        user_id: Uuid,
        period_start: DateTime<Utc>,
    ) -> Result<Option<UsagePeriodEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = usage_periods::table
            .filter(usage_periods::user_id.eq(user_id))
            .filter(usage_periods::period_start.eq(period_start))
            .select(UsagePeriodEntity::as_select())
            .first::<UsagePeriodEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn try_consume(
        &self,
        user_id: Uuid,
        window: UsageWindow,
        kind: UsageKind,
        quota: Quota,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let insert_entity = InsertUsagePeriodEntity {
            user_id,
            period_start: window.start,
            period_end: window.end,
            ai_enhancements_day: now.date_naive(),
        };

        let outcome = conn.transaction::<ConsumeOutcome, diesel::result::Error, _>(|tx| {
            insert_into(usage_periods::table)
                .values(&insert_entity)
                .on_conflict((usage_periods::user_id, usage_periods::period_start))
                .do_nothing()
                .execute(tx)?;

            let mut period = usage_periods::table
                .filter(usage_periods::user_id.eq(user_id))
                .filter(usage_periods::period_start.eq(window.start))
                .select(UsagePeriodEntity::as_select())
                .for_update()
                .first::<UsagePeriodEntity>(tx)?;

            if !period.try_consume(kind, quota, now) {
                return Ok(ConsumeOutcome::QuotaExceeded(period));
            }

            let updated = update(usage_periods::table.find(period.id))
                .set(&UsageCountersChangeset::from(&period))
                .returning(UsagePeriodEntity::as_select())
                .get_result::<UsagePeriodEntity>(tx)?;

            Ok(ConsumeOutcome::Consumed(updated))
        })?;

        Ok(outcome)
    }
}
