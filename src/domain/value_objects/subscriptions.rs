use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
    value_objects::months::BillingMonth,
};

pub const MAX_SERVICE_NAME_LEN: usize = 255;

/// Write-path payload. Dates arrive in the canonical `MM-YYYY` form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionInput {
    pub service_name: String,
    pub price: i32,
    pub user_id: String,
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
}

impl SubscriptionInput {
    /// Validates every field and converts the canonical month strings into
    /// first-of-month dates.
    pub fn to_entity(&self) -> Result<InsertSubscriptionEntity> {
        let service_name = self.service_name.trim();
        if service_name.is_empty() {
            bail!("service_name must not be empty");
        }
        if service_name.len() > MAX_SERVICE_NAME_LEN {
            bail!("service_name must be at most {} bytes", MAX_SERVICE_NAME_LEN);
        }

        if self.price <= 0 {
            bail!("price must be a positive whole number");
        }

        let user_id = parse_user_id(self.user_id.trim())?;

        let start = BillingMonth::parse(&self.start_date)?;
        let end = self
            .end_date
            .as_deref()
            .map(BillingMonth::parse)
            .transpose()?;

        if let Some(end) = end {
            if end < start {
                bail!("end_date {} precedes start_date {}", end, start);
            }
        }

        Ok(InsertSubscriptionEntity {
            service_name: service_name.to_string(),
            price: self.price,
            user_id: user_id.to_string(),
            start_date: start.first_day(),
            end_date: end.map(|month| month.first_day()),
        })
    }
}

/// Read-path view with dates formatted as `MM-YYYY`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionDto {
    pub id: i32,
    pub service_name: String,
    pub price: i32,
    pub user_id: String,
    pub start_date: String,
    pub end_date: Option<String>,
}

impl From<SubscriptionEntity> for SubscriptionDto {
    fn from(value: SubscriptionEntity) -> Self {
        Self {
            id: value.id,
            service_name: value.service_name,
            price: value.price,
            user_id: value.user_id,
            start_date: BillingMonth::from_date(value.start_date).to_string(),
            end_date: value
                .end_date
                .map(|date| BillingMonth::from_date(date).to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatedSubscriptionDto {
    pub id: i32,
}

/// Raw price query as received from the caller. Empty filter strings mean
/// "no filter".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PriceQueryInput {
    pub service_name: Option<String>,
    pub user_id: Option<String>,
    pub start: String,
    pub end: String,
}

impl PriceQueryInput {
    pub fn to_query(&self) -> Result<PriceQuery> {
        let service_name = non_empty(self.service_name.as_deref()).map(str::to_string);

        let user_id = non_empty(self.user_id.as_deref())
            .map(parse_user_id)
            .transpose()?;

        let start = BillingMonth::parse(&self.start)?;
        let end = BillingMonth::parse(&self.end)?;

        if start > end {
            bail!("start {} is after end {}", start, end);
        }

        Ok(PriceQuery {
            service_name,
            user_id,
            start,
            end,
        })
    }
}

/// User ids are random (version 4) UUIDs.
fn parse_user_id(raw: &str) -> Result<Uuid> {
    let user_id =
        Uuid::parse_str(raw).map_err(|err| anyhow!("user_id must be a UUID: {}", err))?;
    if user_id.get_version_num() != 4 {
        bail!("user_id must be a version 4 UUID");
    }
    Ok(user_id)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A validated price aggregation request. `start <= end` holds for every
/// value built through [`PriceQueryInput::to_query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceQuery {
    pub service_name: Option<String>,
    pub user_id: Option<Uuid>,
    pub start: BillingMonth,
    pub end: BillingMonth,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TotalPriceDto {
    pub price: i64,
}
