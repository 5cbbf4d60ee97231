use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::{
    entities::subscriptions::{
        InsertSubscriptionEntity, SubscriptionEntity, UpdateSubscriptionEntity,
    },
    value_objects::subscriptions::PriceQuery,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("operation cancelled before the store replied")]
    Cancelled,
    #[error(transparent)]
    Persistence(#[from] anyhow::Error),
}

pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Durable CRUD over subscriptions. `update` and `delete` report
/// [`RepositoryError::NotFound`] from the affected-row count of the mutating
/// statement itself.
#[automock]
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn create(
        &self,
        insert_subscription_entity: InsertSubscriptionEntity,
        cancel: CancellationToken,
    ) -> RepositoryResult<i32>;

    async fn find_by_id(
        &self,
        subscription_id: i32,
        cancel: CancellationToken,
    ) -> RepositoryResult<SubscriptionEntity>;

    async fn find_all(&self, cancel: CancellationToken) -> RepositoryResult<Vec<SubscriptionEntity>>;

    async fn update(
        &self,
        subscription_id: i32,
        update_subscription_entity: UpdateSubscriptionEntity,
        cancel: CancellationToken,
    ) -> RepositoryResult<()>;

    async fn delete(&self, subscription_id: i32, cancel: CancellationToken) -> RepositoryResult<()>;
}

#[automock]
#[async_trait]
pub trait SubscriptionPriceRepository: Send + Sync {
    /// Sum of `price` over subscriptions matching `query`; `0` when nothing
    /// matches.
    async fn total_price(&self, query: PriceQuery, cancel: CancellationToken) -> RepositoryResult<i64>;
}
