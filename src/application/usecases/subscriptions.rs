use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::{
    repositories::subscriptions::{
        RepositoryError, SubscriptionPriceRepository, SubscriptionRepository,
    },
    value_objects::subscriptions::{PriceQueryInput, SubscriptionDto, SubscriptionInput},
};

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("subscription {0} not found")]
    SubscriptionNotFound(i32),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("operation cancelled: deadline exceeded")]
    Cancelled,
    #[error(transparent)]
    Persistence(anyhow::Error),
}

impl SubscriptionError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            SubscriptionError::SubscriptionNotFound(_) => StatusCode::NOT_FOUND,
            SubscriptionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            SubscriptionError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
            SubscriptionError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Translates a store outcome. `NotFound` only becomes a domain condition
    /// when the operation targeted a specific id.
    fn from_repository(err: RepositoryError, subscription_id: Option<i32>) -> Self {
        match (err, subscription_id) {
            (RepositoryError::NotFound, Some(id)) => SubscriptionError::SubscriptionNotFound(id),
            (RepositoryError::NotFound, None) => {
                SubscriptionError::Persistence(anyhow::anyhow!("unexpected not-found from store"))
            }
            (RepositoryError::Cancelled, _) => SubscriptionError::Cancelled,
            (RepositoryError::Persistence(err), _) => SubscriptionError::Persistence(err),
        }
    }
}

pub type SubscriptionResult<T> = std::result::Result<T, SubscriptionError>;

pub struct SubscriptionUseCase<S, P>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: SubscriptionPriceRepository + Send + Sync + 'static,
{
    subscription_repository: Arc<S>,
    subscription_price_repository: Arc<P>,
}

impl<S, P> SubscriptionUseCase<S, P>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: SubscriptionPriceRepository + Send + Sync + 'static,
{
    pub fn new(subscription_repository: Arc<S>, subscription_price_repository: Arc<P>) -> Self {
        Self {
            subscription_repository,
            subscription_price_repository,
        }
    }

    pub async fn create(
        &self,
        input: SubscriptionInput,
        cancel: CancellationToken,
    ) -> SubscriptionResult<i32> {
        let entity = input.to_entity().map_err(|err| {
            warn!(
                error = %err,
                status = axum::http::StatusCode::BAD_REQUEST.as_u16(),
                "subscriptions: rejected create input"
            );
            SubscriptionError::InvalidInput(err.to_string())
        })?;

        let service_name = entity.service_name.clone();
        let user_id = entity.user_id.clone();

        let subscription_id = self
            .subscription_repository
            .create(entity, cancel)
            .await
            .map_err(|err| {
                error!(
                    %service_name,
                    %user_id,
                    db_error = ?err,
                    "subscriptions: failed to create subscription"
                );
                SubscriptionError::from_repository(err, None)
            })?;

        info!(
            subscription_id,
            %service_name,
            %user_id,
            "subscriptions: subscription created"
        );

        Ok(subscription_id)
    }

    pub async fn find_by_id(
        &self,
        subscription_id: i32,
        cancel: CancellationToken,
    ) -> SubscriptionResult<SubscriptionDto> {
        let entity = self
            .subscription_repository
            .find_by_id(subscription_id, cancel)
            .await
            .map_err(|err| {
                if !matches!(err, RepositoryError::NotFound) {
                    error!(
                        subscription_id,
                        db_error = ?err,
                        "subscriptions: failed to find subscription"
                    );
                }
                SubscriptionError::from_repository(err, Some(subscription_id))
            })?;

        Ok(SubscriptionDto::from(entity))
    }

    pub async fn find_all(&self, cancel: CancellationToken) -> SubscriptionResult<Vec<SubscriptionDto>> {
        let entities = self
            .subscription_repository
            .find_all(cancel)
            .await
            .map_err(|err| {
                error!(db_error = ?err, "subscriptions: failed to list subscriptions");
                SubscriptionError::from_repository(err, None)
            })?;

        debug!(count = entities.len(), "subscriptions: listed subscriptions");

        Ok(entities.into_iter().map(SubscriptionDto::from).collect())
    }

    pub async fn update(
        &self,
        subscription_id: i32,
        input: SubscriptionInput,
        cancel: CancellationToken,
    ) -> SubscriptionResult<()> {
        let entity = input.to_entity().map_err(|err| {
            warn!(
                subscription_id,
                error = %err,
                status = axum::http::StatusCode::BAD_REQUEST.as_u16(),
                "subscriptions: rejected update input"
            );
            SubscriptionError::InvalidInput(err.to_string())
        })?;

        self.subscription_repository
            .update(subscription_id, entity.into(), cancel)
            .await
            .map_err(|err| {
                if !matches!(err, RepositoryError::NotFound) {
                    error!(
                        subscription_id,
                        db_error = ?err,
                        "subscriptions: failed to update subscription"
                    );
                }
                SubscriptionError::from_repository(err, Some(subscription_id))
            })?;

        info!(subscription_id, "subscriptions: subscription updated");

        Ok(())
    }

    pub async fn delete(&self, subscription_id: i32, cancel: CancellationToken) -> SubscriptionResult<()> {
        self.subscription_repository
            .delete(subscription_id, cancel)
            .await
            .map_err(|err| {
                if !matches!(err, RepositoryError::NotFound) {
                    error!(
                        subscription_id,
                        db_error = ?err,
                        "subscriptions: failed to delete subscription"
                    );
                }
                SubscriptionError::from_repository(err, Some(subscription_id))
            })?;

        info!(subscription_id, "subscriptions: subscription deleted");

        Ok(())
    }

    pub async fn total_price(
        &self,
        input: PriceQueryInput,
        cancel: CancellationToken,
    ) -> SubscriptionResult<i64> {
        let query = input.to_query().map_err(|err| {
            warn!(
                error = %err,
                status = axum::http::StatusCode::BAD_REQUEST.as_u16(),
                "subscriptions: rejected price query"
            );
            SubscriptionError::InvalidInput(err.to_string())
        })?;

        let service_name = query.service_name.clone();
        let user_id = query.user_id;
        let window = format!("{}..{}", query.start, query.end);

        self.subscription_price_repository
            .total_price(query, cancel)
            .await
            .map_err(|err| {
                error!(
                    ?service_name,
                    ?user_id,
                    %window,
                    db_error = ?err,
                    "subscriptions: failed to compute total price"
                );
                SubscriptionError::from_repository(err, None)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        entities::subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
        repositories::subscriptions::{MockSubscriptionPriceRepository, MockSubscriptionRepository},
        value_objects::{months::BillingMonth, subscriptions::PriceQuery},
    };
    use chrono::NaiveDate;
    use mockall::{Sequence, predicate::eq};
    use std::sync::Mutex;
    use uuid::Uuid;

    const USER_ID: &str = "6114696a-d069-4fad-a3ed-f27c13651c3a";

    fn date(year: i32, month: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, 1).unwrap()
    }

    fn sample_input() -> SubscriptionInput {
        SubscriptionInput {
            service_name: "Yandex".to_string(),
            price: 500,
            user_id: USER_ID.to_string(),
            start_date: "12-2024".to_string(),
            end_date: Some("01-2025".to_string()),
        }
    }

    fn sample_entity(id: i32) -> SubscriptionEntity {
        SubscriptionEntity {
            id,
            service_name: "Yandex".to_string(),
            price: 500,
            user_id: USER_ID.to_string(),
            start_date: date(2024, 12),
            end_date: Some(date(2025, 1)),
        }
    }

    fn usecase(
        subscription_repo: MockSubscriptionRepository,
        price_repo: MockSubscriptionPriceRepository,
    ) -> SubscriptionUseCase<MockSubscriptionRepository, MockSubscriptionPriceRepository> {
        SubscriptionUseCase::new(Arc::new(subscription_repo), Arc::new(price_repo))
    }

    #[tokio::test]
    async fn create_then_find_round_trips_every_field() {
        let stored: Arc<Mutex<Option<InsertSubscriptionEntity>>> = Arc::new(Mutex::new(None));
        let mut subscription_repo = MockSubscriptionRepository::new();

        let captured = Arc::clone(&stored);
        subscription_repo
            .expect_create()
            .times(1)
            .returning(move |entity, _| {
                *captured.lock().unwrap() = Some(entity);
                Ok(42)
            });

        let readable = Arc::clone(&stored);
        subscription_repo
            .expect_find_by_id()
            .with(eq(42), mockall::predicate::always())
            .returning(move |id, _| {
                let entity = readable.lock().unwrap().clone().unwrap();
                Ok(SubscriptionEntity {
                    id,
                    service_name: entity.service_name,
                    price: entity.price,
                    user_id: entity.user_id,
                    start_date: entity.start_date,
                    end_date: entity.end_date,
                })
            });

        let usecase = usecase(subscription_repo, MockSubscriptionPriceRepository::new());
        let input = sample_input();

        let id = usecase
            .create(input.clone(), CancellationToken::new())
            .await
            .unwrap();
        let dto = usecase.find_by_id(id, CancellationToken::new()).await.unwrap();

        assert_eq!(dto.id, 42);
        assert_eq!(dto.service_name, input.service_name);
        assert_eq!(dto.price, input.price);
        assert_eq!(dto.user_id, input.user_id);
        assert_eq!(dto.start_date, input.start_date);
        assert_eq!(dto.end_date, input.end_date);
    }

    #[tokio::test]
    async fn create_stores_first_of_month_dates() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_create()
            .withf(|entity, _| {
                entity.start_date == date(2024, 12) && entity.end_date == Some(date(2025, 1))
            })
            .returning(|_, _| Ok(1));

        let usecase = usecase(subscription_repo, MockSubscriptionPriceRepository::new());

        assert_eq!(
            usecase
                .create(sample_input(), CancellationToken::new())
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_store() {
        // No expectations: any repository call panics.
        let usecase = usecase(
            MockSubscriptionRepository::new(),
            MockSubscriptionPriceRepository::new(),
        );

        let bad_date = SubscriptionInput {
            start_date: "2024-12".to_string(),
            ..sample_input()
        };
        let err = usecase
            .create(bad_date.clone(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::InvalidInput(_)));

        let err = usecase
            .update(7, bad_date, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::InvalidInput(_)));

        let err = usecase
            .total_price(
                PriceQueryInput {
                    start: "05-2025".to_string(),
                    end: "01-2025".to_string(),
                    ..Default::default()
                },
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::InvalidInput(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_ids_map_to_subscription_not_found() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_id()
            .returning(|_, _| Err(RepositoryError::NotFound));
        subscription_repo
            .expect_update()
            .returning(|_, _, _| Err(RepositoryError::NotFound));
        subscription_repo
            .expect_delete()
            .returning(|_, _| Err(RepositoryError::NotFound));

        let usecase = usecase(subscription_repo, MockSubscriptionPriceRepository::new());

        let err = usecase.find_by_id(9, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::SubscriptionNotFound(9)));
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);

        let err = usecase
            .update(9, sample_input(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::SubscriptionNotFound(9)));

        let err = usecase.delete(9, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::SubscriptionNotFound(9)));
    }

    #[tokio::test]
    async fn deleting_twice_succeeds_then_reports_not_found() {
        let mut seq = Sequence::new();
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_delete()
            .with(eq(3), mockall::predicate::always())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        subscription_repo
            .expect_delete()
            .with(eq(3), mockall::predicate::always())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(RepositoryError::NotFound));

        let usecase = usecase(subscription_repo, MockSubscriptionPriceRepository::new());

        assert!(usecase.delete(3, CancellationToken::new()).await.is_ok());
        assert!(matches!(
            usecase.delete(3, CancellationToken::new()).await,
            Err(SubscriptionError::SubscriptionNotFound(3))
        ));
    }

    #[tokio::test]
    async fn update_replaces_every_mutable_field() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_update()
            .withf(|id, entity, _| {
                *id == 5
                    && entity.service_name == "Google"
                    && entity.price == 1000
                    && entity.start_date == date(2025, 2)
                    && entity.end_date.is_none()
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let usecase = usecase(subscription_repo, MockSubscriptionPriceRepository::new());
        let input = SubscriptionInput {
            service_name: "Google".to_string(),
            price: 1000,
            start_date: "02-2025".to_string(),
            end_date: None,
            ..sample_input()
        };

        assert!(usecase.update(5, input, CancellationToken::new()).await.is_ok());
    }

    #[tokio::test]
    async fn persistence_errors_pass_through() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_all()
            .returning(|_| Err(RepositoryError::Persistence(anyhow::anyhow!("connection refused"))));

        let usecase = usecase(subscription_repo, MockSubscriptionPriceRepository::new());
        let err = usecase.find_all(CancellationToken::new()).await.unwrap_err();

        match err {
            SubscriptionError::Persistence(inner) => {
                assert_eq!(inner.to_string(), "connection refused")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_is_reported_distinctly() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_id()
            .returning(|_, _| Err(RepositoryError::Cancelled));

        let usecase = usecase(subscription_repo, MockSubscriptionPriceRepository::new());
        let err = usecase.find_by_id(1, CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, SubscriptionError::Cancelled));
        assert_eq!(err.status_code(), axum::http::StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn caller_token_reaches_the_store() {
        let token = CancellationToken::new();
        token.cancel();

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_all()
            .withf(|cancel| cancel.is_cancelled())
            .returning(|_| Err(RepositoryError::Cancelled));

        let usecase = usecase(subscription_repo, MockSubscriptionPriceRepository::new());

        assert!(matches!(
            usecase.find_all(token).await,
            Err(SubscriptionError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn find_all_formats_dates() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_find_all().returning(|_| {
            Ok(vec![
                sample_entity(1),
                SubscriptionEntity {
                    end_date: None,
                    ..sample_entity(2)
                },
            ])
        });

        let usecase = usecase(subscription_repo, MockSubscriptionPriceRepository::new());
        let all = usecase.find_all(CancellationToken::new()).await.unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(all[0].start_date, "12-2024");
        assert_eq!(all[0].end_date.as_deref(), Some("01-2025"));
        assert_eq!(all[1].end_date, None);
    }

    #[tokio::test]
    async fn total_price_delegates_parsed_query() {
        let user_id = Uuid::parse_str(USER_ID).unwrap();
        let expected = PriceQuery {
            service_name: Some("Yandex".to_string()),
            user_id: Some(user_id),
            start: BillingMonth::new(2025, 1).unwrap(),
            end: BillingMonth::new(2025, 5).unwrap(),
        };

        let mut price_repo = MockSubscriptionPriceRepository::new();
        price_repo
            .expect_total_price()
            .with(eq(expected), mockall::predicate::always())
            .times(1)
            .returning(|_, _| Ok(1000));

        let usecase = usecase(MockSubscriptionRepository::new(), price_repo);
        let total = usecase
            .total_price(
                PriceQueryInput {
                    service_name: Some("Yandex".to_string()),
                    user_id: Some(USER_ID.to_string()),
                    start: "01-2025".to_string(),
                    end: "05-2025".to_string(),
                },
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(total, 1000);
    }

    #[tokio::test]
    async fn total_price_of_nothing_is_zero() {
        let mut price_repo = MockSubscriptionPriceRepository::new();
        price_repo
            .expect_total_price()
            .withf(|query, _| query.service_name.is_none() && query.user_id.is_none())
            .returning(|_, _| Ok(0));

        let usecase = usecase(MockSubscriptionRepository::new(), price_repo);
        let total = usecase
            .total_price(
                PriceQueryInput {
                    service_name: Some(String::new()),
                    user_id: None,
                    start: "09-2030".to_string(),
                    end: "10-2030".to_string(),
                },
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(total, 0);
    }
}
