use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow, bail};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A calendar month. Stored as the first day of the month; the day component
/// never carries meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BillingMonth(NaiveDate);

impl BillingMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self)
            .ok_or_else(|| anyhow!("Invalid month: {:02}-{:04}", month, year))
    }

    /// Normalizes any date to the month it falls in.
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.with_day(1).unwrap_or(date))
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    /// Parses the canonical `MM-YYYY` form: exactly two month digits, a dash
    /// and exactly four year digits.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let Some((month, year)) = trimmed.split_once('-') else {
            bail!("Invalid month '{}': expected MM-YYYY", raw);
        };

        if month.len() != 2
            || year.len() != 4
            || !month.bytes().all(|b| b.is_ascii_digit())
            || !year.bytes().all(|b| b.is_ascii_digit())
        {
            bail!("Invalid month '{}': expected MM-YYYY", raw);
        }

        let month: u32 = month.parse()?;
        let year: i32 = year.parse()?;

        Self::new(year, month).map_err(|_| anyhow!("Invalid month '{}': expected MM-YYYY", raw))
    }
}

impl fmt::Display for BillingMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:04}", self.0.month(), self.0.year())
    }
}

impl FromStr for BillingMonth {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BillingMonth {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<BillingMonth> for String {
    fn from(value: BillingMonth) -> Self {
        value.to_string()
    }
}

impl From<BillingMonth> for NaiveDate {
    fn from(value: BillingMonth) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_month_is_parsed_to_first_day() {
        let month = BillingMonth::parse("07-2025").unwrap();
        assert_eq!(
            month.first_day(),
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
        );
        assert_eq!(month.to_string(), "07-2025");
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let month = BillingMonth::parse(" 12-2024 ").unwrap();
        assert_eq!(month, BillingMonth::new(2024, 12).unwrap());
    }

    #[test]
    fn non_canonical_forms_are_rejected() {
        for raw in [
            "", "7-2025", "07-25", "2025-07", "13-2025", "00-2025", "07/2025", "07-2025-01",
            "ab-2025", "+7-2025",
        ] {
            assert!(BillingMonth::parse(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn any_day_is_normalized_to_first_of_month() {
        let date = NaiveDate::from_ymd_opt(2025, 2, 17).unwrap();
        assert_eq!(
            BillingMonth::from_date(date),
            BillingMonth::new(2025, 2).unwrap()
        );
    }

    #[test]
    fn months_order_chronologically() {
        let december = BillingMonth::parse("12-2024").unwrap();
        let january = BillingMonth::parse("01-2025").unwrap();
        assert!(december < january);
    }

    #[test]
    fn serializes_as_canonical_string() {
        let month = BillingMonth::new(2025, 3).unwrap();
        assert_eq!(serde_json::to_string(&month).unwrap(), "\"03-2025\"");

        let parsed: BillingMonth = serde_json::from_str("\"03-2025\"").unwrap();
        assert_eq!(parsed, month);
        assert!(serde_json::from_str::<BillingMonth>("\"3-2025\"").is_err());
    }
}
