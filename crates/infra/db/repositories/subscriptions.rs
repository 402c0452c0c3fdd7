use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::subscriptions},
};
use domain::{
    entities::subscriptions::{
        InsertSubscriptionEntity, ProviderSubscriptionChangeset, SubscriptionEntity,
    },
    repositories::subscriptions::SubscriptionRepository,
    value_objects::{
        enums::subscription_statuses::SubscriptionStatus,
        subscriptions::{CheckoutCompletion, ProviderSubscriptionUpdate, ProviderUpdateOutcome},
    },
};

pub const STRIPE_PROVIDER: &str = "stripe";

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }

    /// Distinguishes a guarded UPDATE that touched nothing because the row is
    /// newer from one that touched nothing because the row does not exist.
    fn miss_outcome(
        conn: &mut PgConnection,
        external_subscription_id: &str,
        event_at: DateTime<Utc>,
    ) -> Result<ProviderUpdateOutcome> {
        let existing = subscriptions::table
            .filter(subscriptions::external_subscription_id.eq(external_subscription_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(conn)
            .optional()?;

        Ok(match existing {
            Some(row) if !row.accepts_event_at(event_at) => ProviderUpdateOutcome::Stale,
            _ => ProviderUpdateOutcome::NotFound,
        })
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_by_external_subscription_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::external_subscription_id.eq(external_subscription_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn upsert_on_checkout_completed(
        &self,
        completion: CheckoutCompletion,
    ) -> Result<SubscriptionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();
        let period_end = completion
            .billing_period
            .period_end(completion.event_at)
            .unwrap_or(completion.event_at);

        let insert_entity = InsertSubscriptionEntity {
            user_id: completion.user_id,
            tier: completion.tier.to_string(),
            status: SubscriptionStatus::Active.to_string(),
            billing_period: completion.billing_period.to_string(),
            payment_provider: STRIPE_PROVIDER.to_string(),
            external_subscription_id: Some(completion.external_subscription_id.clone()),
            customer_id: Some(completion.customer_id.clone()),
            current_period_start: completion.event_at,
            current_period_end: period_end,
            cancel_at_period_end: false,
            last_event_at: None,
            updated_at: now,
        };

        let result = conn.transaction::<SubscriptionEntity, diesel::result::Error, _>(|tx| {
            insert_into(subscriptions::table)
                .values(&insert_entity)
                .on_conflict(subscriptions::user_id)
                .do_nothing()
                .execute(tx)?;

            let current = subscriptions::table
                .filter(subscriptions::user_id.eq(completion.user_id))
                .select(SubscriptionEntity::as_select())
                .for_update()
                .first::<SubscriptionEntity>(tx)?;

            // Redelivery for the subscription already on the row only refreshes the customer.
            if current.external_subscription_id.as_deref()
                == Some(completion.external_subscription_id.as_str())
            {
                return update(subscriptions::table.find(current.id))
                    .set((
                        subscriptions::customer_id.eq(Some(&completion.customer_id)),
                        subscriptions::updated_at.eq(now),
                    ))
                    .returning(SubscriptionEntity::as_select())
                    .get_result::<SubscriptionEntity>(tx);
            }

            update(subscriptions::table.find(current.id))
                .set((
                    subscriptions::tier.eq(&insert_entity.tier),
                    subscriptions::status.eq(&insert_entity.status),
                    subscriptions::billing_period.eq(&insert_entity.billing_period),
                    subscriptions::external_subscription_id
                        .eq(&insert_entity.external_subscription_id),
                    subscriptions::customer_id.eq(&insert_entity.customer_id),
                    subscriptions::current_period_start.eq(insert_entity.current_period_start),
                    subscriptions::current_period_end.eq(insert_entity.current_period_end),
                    subscriptions::cancel_at_period_end.eq(false),
                    subscriptions::canceled_at.eq::<Option<DateTime<Utc>>>(None),
                    subscriptions::trial_start.eq::<Option<DateTime<Utc>>>(None),
                    subscriptions::trial_end.eq::<Option<DateTime<Utc>>>(None),
                    subscriptions::updated_at.eq(now),
                ))
                .returning(SubscriptionEntity::as_select())
                .get_result::<SubscriptionEntity>(tx)
        })?;

        Ok(result)
    }

    async fn apply_provider_update(
        &self,
        provider_update: ProviderSubscriptionUpdate,
    ) -> Result<ProviderUpdateOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let event_at = provider_update.event_at;

        let changeset = ProviderSubscriptionChangeset {
            tier: provider_update.tier.map(|tier| tier.to_string()),
            billing_period: provider_update.billing_period.map(|period| period.to_string()),
            status: provider_update.status.to_string(),
            cancel_at_period_end: provider_update.cancel_at_period_end,
            current_period_start: provider_update.current_period_start,
            current_period_end: provider_update.current_period_end,
            canceled_at: Some(provider_update.canceled_at),
            trial_start: Some(provider_update.trial_start),
            trial_end: Some(provider_update.trial_end),
            last_event_at: event_at,
            updated_at: Utc::now(),
        };

        let updated = update(subscriptions::table)
            .filter(
                subscriptions::external_subscription_id
                    .eq(&provider_update.external_subscription_id),
            )
            .filter(
                subscriptions::last_event_at
                    .is_null()
                    .or(subscriptions::last_event_at.le(event_at)),
            )
            .set(&changeset)
            .execute(&mut conn)?;

        if updated > 0 {
            return Ok(ProviderUpdateOutcome::Applied);
        }

        Self::miss_outcome(
            &mut conn,
            &provider_update.external_subscription_id,
            event_at,
        )
    }

    async fn apply_provider_deletion(
        &self,
        external_subscription_id: &str,
        canceled_at: DateTime<Utc>,
        event_at: DateTime<Utc>,
    ) -> Result<ProviderUpdateOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(subscriptions::table)
            .filter(subscriptions::external_subscription_id.eq(external_subscription_id))
            .filter(
                subscriptions::last_event_at
                    .is_null()
                    .or(subscriptions::last_event_at.le(event_at)),
            )
            .set((
                subscriptions::status.eq(SubscriptionStatus::Canceled.to_string()),
                subscriptions::canceled_at.eq(Some(canceled_at)),
                subscriptions::cancel_at_period_end.eq(false),
                subscriptions::last_event_at.eq(Some(event_at)),
                subscriptions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        if updated > 0 {
            return Ok(ProviderUpdateOutcome::Applied);
        }

        Self::miss_outcome(&mut conn, external_subscription_id, event_at)
    }

    async fn update_status_by_external_subscription_id(
        &self,
        external_subscription_id: &str,
        from: Vec<SubscriptionStatus>,
        to: SubscriptionStatus,
        event_at: DateTime<Utc>,
    ) -> Result<ProviderUpdateOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let from: Vec<String> = from.iter().map(ToString::to_string).collect();

        let updated = update(subscriptions::table)
            .filter(subscriptions::external_subscription_id.eq(external_subscription_id))
            .filter(subscriptions::status.eq_any(from))
            .filter(
                subscriptions::last_event_at
                    .is_null()
                    .or(subscriptions::last_event_at.le(event_at)),
            )
            .set((
                subscriptions::status.eq(to.to_string()),
                subscriptions::last_event_at.eq(Some(event_at)),
                subscriptions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        if updated > 0 {
            return Ok(ProviderUpdateOutcome::Applied);
        }

        Self::miss_outcome(&mut conn, external_subscription_id, event_at)
    }

    async fn set_cancel_at_period_end(
        &self,
        user_id: Uuid,
        cancel_at_period_end: bool,
        canceled_at: Option<DateTime<Utc>>,
    ) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = update(subscriptions::table)
            .filter(subscriptions::user_id.eq(user_id))
            .filter(subscriptions::external_subscription_id.is_not_null())
            .filter(subscriptions::status.ne(SubscriptionStatus::Canceled.to_string()))
            .set((
                subscriptions::cancel_at_period_end.eq(cancel_at_period_end),
                subscriptions::canceled_at.eq(canceled_at),
                subscriptions::updated_at.eq(Utc::now()),
            ))
            .returning(SubscriptionEntity::as_select())
            .get_result::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }
}
