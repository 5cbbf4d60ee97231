use async_trait::async_trait;
use diesel::{RunQueryDsl, delete, insert_into, prelude::*, update};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{
        entities::subscriptions::{
            InsertSubscriptionEntity, SubscriptionEntity, UpdateSubscriptionEntity,
        },
        repositories::subscriptions::{
            RepositoryError, RepositoryResult, SubscriptionRepository,
        },
    },
    infrastructure::postgres::{
        postgres_connection::{PgPoolSquad, run_cancellable},
        schema::subscriptions,
    },
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

fn ensure_affected(affected_rows: usize) -> RepositoryResult<()> {
    if affected_rows == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn create(
        &self,
        insert_subscription_entity: InsertSubscriptionEntity,
        cancel: CancellationToken,
    ) -> RepositoryResult<i32> {
        run_cancellable(&self.db_pool, &cancel, move |conn| {
            let id = insert_into(subscriptions::table)
                .values(&insert_subscription_entity)
                .returning(subscriptions::id)
                .get_result::<i32>(conn)?;

            Ok(id)
        })
        .await
    }

    async fn find_by_id(
        &self,
        subscription_id: i32,
        cancel: CancellationToken,
    ) -> RepositoryResult<SubscriptionEntity> {
        run_cancellable(&self.db_pool, &cancel, move |conn| {
            let result = subscriptions::table
                .filter(subscriptions::id.eq(subscription_id))
                .select(SubscriptionEntity::as_select())
                .first::<SubscriptionEntity>(conn)
                .optional()?;

            Ok(result)
        })
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    async fn find_all(&self, cancel: CancellationToken) -> RepositoryResult<Vec<SubscriptionEntity>> {
        run_cancellable(&self.db_pool, &cancel, move |conn| {
            let results = subscriptions::table
                .select(SubscriptionEntity::as_select())
                .order(subscriptions::id.asc())
                .load::<SubscriptionEntity>(conn)?;

            Ok(results)
        })
        .await
    }

    async fn update(
        &self,
        subscription_id: i32,
        update_subscription_entity: UpdateSubscriptionEntity,
        cancel: CancellationToken,
    ) -> RepositoryResult<()> {
        let affected_rows = run_cancellable(&self.db_pool, &cancel, move |conn| {
            let affected_rows = update(subscriptions::table)
                .filter(subscriptions::id.eq(subscription_id))
                .set(&update_subscription_entity)
                .execute(conn)?;

            Ok(affected_rows)
        })
        .await?;

        ensure_affected(affected_rows)
    }

    async fn delete(&self, subscription_id: i32, cancel: CancellationToken) -> RepositoryResult<()> {
        let affected_rows = run_cancellable(&self.db_pool, &cancel, move |conn| {
            let affected_rows = delete(subscriptions::table)
                .filter(subscriptions::id.eq(subscription_id))
                .execute(conn)?;

            Ok(affected_rows)
        })
        .await?;

        ensure_affected(affected_rows)
    }
}
