use async_trait::async_trait;
use diesel::{
    RunQueryDsl,
    dsl::sum,
    pg::Pg,
    prelude::*,
    sql_types::{BigInt, Nullable},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{
        repositories::subscriptions::{RepositoryResult, SubscriptionPriceRepository},
        value_objects::subscriptions::PriceQuery,
    },
    infrastructure::postgres::{
        postgres_connection::{PgPoolSquad, run_cancellable},
        schema::subscriptions,
    },
};

pub struct SubscriptionPricePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPricePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

/// `SUM(price)` over every subscription whose active period overlaps the
/// window, narrowed by whichever filters are present.
fn price_statement(
    query: PriceQuery,
) -> subscriptions::BoxedQuery<'static, Pg, Nullable<BigInt>> {
    let window_start = query.start.first_day();
    let window_end = query.end.first_day();

    // start_date <= end AND (end_date IS NULL OR end_date >= start)
    let mut statement = subscriptions::table
        .select(sum(subscriptions::price))
        .filter(subscriptions::start_date.le(window_end))
        .filter(
            subscriptions::end_date
                .is_null()
                .or(subscriptions::end_date.ge(window_start)),
        )
        .into_boxed();

    if let Some(service_name) = query.service_name {
        statement = statement.filter(subscriptions::service_name.eq(service_name));
    }

    if let Some(user_id) = query.user_id {
        statement = statement.filter(subscriptions::user_id.eq(user_id.to_string()));
    }

    statement
}

#[async_trait]
impl SubscriptionPriceRepository for SubscriptionPricePostgres {
    async fn total_price(&self, query: PriceQuery, cancel: CancellationToken) -> RepositoryResult<i64> {
        run_cancellable(&self.db_pool, &cancel, move |conn| {
            // SUM over zero rows is NULL.
            let total = price_statement(query).get_result::<Option<i64>>(conn)?;

            Ok(total.unwrap_or(0))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::subscriptions::PriceQueryInput;
    use diesel::debug_query;

    const USER_ID: &str = "6114696a-d069-4fad-a3ed-f27c13651c3a";

    fn rendered(service_name: Option<&str>, user_id: Option<&str>) -> String {
        let query = PriceQueryInput {
            service_name: service_name.map(str::to_string),
            user_id: user_id.map(str::to_string),
            start: "01-2025".to_string(),
            end: "05-2025".to_string(),
        }
        .to_query()
        .unwrap();

        debug_query::<Pg, _>(&price_statement(query)).to_string()
    }

    #[test]
    fn window_uses_the_overlap_predicate() {
        let sql = rendered(None, None);

        assert!(sql.to_lowercase().contains(r#"sum("subscriptions"."price")"#), "{sql}");
        assert!(sql.contains(r#""subscriptions"."start_date" <= $1"#), "{sql}");
        assert!(
            sql.contains(
                r#""subscriptions"."end_date" IS NULL OR "subscriptions"."end_date" >= $2"#
            ),
            "{sql}"
        );
        // window end binds first, window start second
        assert!(sql.contains("2025-05-01, 2025-01-01"), "{sql}");
        assert!(!sql.contains(r#""subscriptions"."service_name""#), "{sql}");
        assert!(!sql.contains(r#""subscriptions"."user_id""#), "{sql}");
    }

    #[test]
    fn filters_narrow_the_same_statement() {
        let by_service = rendered(Some("Yandex"), None);
        assert!(by_service.contains(r#""subscriptions"."service_name" = $3"#), "{by_service}");
        assert!(!by_service.contains(r#""subscriptions"."user_id""#), "{by_service}");

        let both = rendered(Some("Yandex"), Some(USER_ID));
        assert!(both.contains(r#""subscriptions"."service_name" = $3"#), "{both}");
        assert!(both.contains(r#""subscriptions"."user_id" = $4"#), "{both}");
        assert!(both.contains(USER_ID), "{both}");
    }
}
