use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::{
    application::usecases::subscriptions::{SubscriptionError, SubscriptionUseCase},
    config::config_model::DotEnvyConfig,
    domain::{
        repositories::subscriptions::{SubscriptionPriceRepository, SubscriptionRepository},
        value_objects::subscriptions::{
            CreatedSubscriptionDto, PriceQueryInput, SubscriptionInput, TotalPriceDto,
        },
    },
    infrastructure::{
        axum_http::request_deadline::RequestDeadline,
        postgres::{
            postgres_connection::PgPoolSquad,
            repositories::{
                subscription_prices::SubscriptionPricePostgres,
                subscriptions::SubscriptionPostgres,
            },
        },
    },
};

pub struct SubscriptionRouterState<S, P>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: SubscriptionPriceRepository + Send + Sync + 'static,
{
    usecase: SubscriptionUseCase<S, P>,
    query_timeout: Duration,
}

impl<S, P> SubscriptionRouterState<S, P>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: SubscriptionPriceRepository + Send + Sync + 'static,
{
    fn deadline(&self) -> RequestDeadline {
        RequestDeadline::start(self.query_timeout)
    }
}

type SharedState<S, P> = State<Arc<SubscriptionRouterState<S, P>>>;

pub fn routes(db_pool: Arc<PgPoolSquad>, config: Arc<DotEnvyConfig>) -> Router {
    let subscription_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let subscription_price_repository = SubscriptionPricePostgres::new(Arc::clone(&db_pool));

    let usecase = SubscriptionUseCase::new(
        Arc::new(subscription_repository),
        Arc::new(subscription_price_repository),
    );

    router(usecase, Duration::from_secs(config.database.query_timeout))
}

pub fn router<S, P>(usecase: SubscriptionUseCase<S, P>, query_timeout: Duration) -> Router
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: SubscriptionPriceRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/", post(create::<S, P>))
        .route("/all", get(find_all::<S, P>))
        .route("/price", get(total_price::<S, P>))
        .route(
            "/:id",
            get(find_by_id::<S, P>)
                .put(update::<S, P>)
                .delete(delete::<S, P>),
        )
        .with_state(Arc::new(SubscriptionRouterState {
            usecase,
            query_timeout,
        }))
}

fn rejected(message: String) -> Response {
    SubscriptionError::InvalidInput(message).into_response()
}

pub async fn create<S, P>(
    State(state): SharedState<S, P>,
    payload: Result<Json<SubscriptionInput>, JsonRejection>,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: SubscriptionPriceRepository + Send + Sync + 'static,
{
    let Json(input) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejected(rejection.body_text()),
    };

    let deadline = state.deadline();
    match state.usecase.create(input, deadline.token()).await {
        Ok(id) => (StatusCode::CREATED, Json(CreatedSubscriptionDto { id })).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn find_all<S, P>(State(state): SharedState<S, P>) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: SubscriptionPriceRepository + Send + Sync + 'static,
{
    let deadline = state.deadline();
    match state.usecase.find_all(deadline.token()).await {
        Ok(subscriptions) => (StatusCode::OK, Json(subscriptions)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn find_by_id<S, P>(
    State(state): SharedState<S, P>,
    id: Result<Path<i32>, PathRejection>,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: SubscriptionPriceRepository + Send + Sync + 'static,
{
    let Path(id) = match id {
        Ok(id) => id,
        Err(rejection) => return rejected(rejection.body_text()),
    };

    let deadline = state.deadline();
    match state.usecase.find_by_id(id, deadline.token()).await {
        Ok(subscription) => (StatusCode::OK, Json(subscription)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn total_price<S, P>(
    State(state): SharedState<S, P>,
    query: Result<Query<PriceQueryInput>, QueryRejection>,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: SubscriptionPriceRepository + Send + Sync + 'static,
{
    let Query(input) = match query {
        Ok(query) => query,
        Err(rejection) => return rejected(rejection.body_text()),
    };

    let deadline = state.deadline();
    match state.usecase.total_price(input, deadline.token()).await {
        Ok(price) => (StatusCode::OK, Json(TotalPriceDto { price })).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn update<S, P>(
    State(state): SharedState<S, P>,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<SubscriptionInput>, JsonRejection>,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: SubscriptionPriceRepository + Send + Sync + 'static,
{
    let Path(id) = match id {
        Ok(id) => id,
        Err(rejection) => return rejected(rejection.body_text()),
    };
    let Json(input) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejected(rejection.body_text()),
    };

    let deadline = state.deadline();
    match state.usecase.update(id, input, deadline.token()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn delete<S, P>(
    State(state): SharedState<S, P>,
    id: Result<Path<i32>, PathRejection>,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: SubscriptionPriceRepository + Send + Sync + 'static,
{
    let Path(id) = match id {
        Ok(id) => id,
        Err(rejection) => return rejected(rejection.body_text()),
    };

    let deadline = state.deadline();
    match state.usecase.delete(id, deadline.token()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}
