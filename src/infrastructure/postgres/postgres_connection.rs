use std::{sync::Arc, thread, time::Duration};

use anyhow::{Context, Result};
use diesel::{
    Connection, PgConnection,
    connection::SimpleConnection,
    r2d2::{ConnectionManager, CustomizeConnection, Pool},
};
use thiserror::Error;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::config_model::Database,
    domain::repositories::subscriptions::{RepositoryError, RepositoryResult},
};

pub type PgPoolSquad = Pool<ConnectionManager<PgConnection>>;

/// Server-side cap on every statement run over a pooled connection.
#[derive(Debug)]
struct StatementTimeout(Duration);

impl CustomizeConnection<PgConnection, diesel::r2d2::Error> for StatementTimeout {
    fn on_acquire(&self, conn: &mut PgConnection) -> std::result::Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!("SET statement_timeout = {}", self.0.as_millis()))
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

fn query_deadline(database: &Database) -> Duration {
    Duration::from_secs(database.query_timeout.max(1))
}

/// Builds the shared pool, retrying a bounded number of times with a fixed
/// backoff. Blocks the calling thread between attempts.
pub fn establish_connection(database: &Database) -> Result<PgPoolSquad> {
    let attempts = database.connect_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        let manager = ConnectionManager::<PgConnection>::new(&database.url);

        match Pool::builder()
            .max_size(database.max_pool_size)
            .connection_timeout(query_deadline(database))
            .connection_customizer(Box::new(StatementTimeout(query_deadline(database))))
            .build(manager)
        {
            Ok(pool) => {
                info!(
                    attempt,
                    max_pool_size = database.max_pool_size,
                    "postgres: connection pool ready"
                );
                return Ok(pool);
            }
            Err(err) => {
                warn!(
                    attempt,
                    attempts_left = attempts - attempt,
                    db_error = %err,
                    "postgres: failed to build connection pool"
                );
                last_error = Some(err);
                if attempt < attempts {
                    thread::sleep(Duration::from_secs(database.connect_backoff));
                }
            }
        }
    }

    Err(last_error
        .map(anyhow::Error::from)
        .unwrap_or_else(|| anyhow::anyhow!("no connection attempt was made")))
    .with_context(|| format!("failed to connect to postgres after {} attempts", attempts))
}

#[derive(Debug, Error)]
enum BlockingError {
    #[error("cancelled before commit")]
    Cancelled,
    #[error(transparent)]
    Diesel(#[from] diesel::result::Error),
    #[error(transparent)]
    Operation(#[from] anyhow::Error),
}

impl From<BlockingError> for RepositoryError {
    fn from(err: BlockingError) -> Self {
        match err {
            BlockingError::Cancelled => RepositoryError::Cancelled,
            BlockingError::Diesel(err) => RepositoryError::Persistence(err.into()),
            BlockingError::Operation(err) => RepositoryError::Persistence(err),
        }
    }
}

/// Runs a synchronous Diesel operation on the blocking threadpool, racing it
/// against `cancel`.
///
/// The operation runs inside its own transaction. Once `cancel` fires the
/// caller gets [`RepositoryError::Cancelled`] right away, and the blocking
/// side either never starts the operation (token seen after checkout) or
/// rolls it back (token seen before commit), so a cancelled write never
/// lands.
pub async fn run_cancellable<T, F>(
    db_pool: &Arc<PgPoolSquad>,
    cancel: &CancellationToken,
    operation: F,
) -> RepositoryResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
{
    if cancel.is_cancelled() {
        return Err(RepositoryError::Cancelled);
    }

    let db_pool = Arc::clone(db_pool);
    let abandoned = cancel.clone();
    let blocking = task::spawn_blocking(move || -> std::result::Result<T, BlockingError> {
        let mut pooled = db_pool
            .get()
            .map_err(|err| BlockingError::Operation(err.into()))?;

        if abandoned.is_cancelled() {
            debug!("postgres: caller gave up while waiting for a connection");
            return Err(BlockingError::Cancelled);
        }

        let conn: &mut PgConnection = &mut pooled;
        conn.transaction::<T, BlockingError, _>(|conn| {
            let output = operation(conn)?;

            if abandoned.is_cancelled() {
                debug!("postgres: caller gave up before commit; rolling back");
                return Err(BlockingError::Cancelled);
            }

            Ok(output)
        })
    });

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RepositoryError::Cancelled),
        joined = blocking => match joined {
            Ok(result) => result.map_err(RepositoryError::from),
            Err(join_error) => Err(RepositoryError::Persistence(join_error.into())),
        },
    }
}
