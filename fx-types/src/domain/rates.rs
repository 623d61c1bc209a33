//! Rate snapshots, conversion results and historical series.
//!
//! All three are built once from an upstream response and never mutated;
//! a refresh replaces the whole value.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::currency::CurrencyCode;
use super::page::PageRequest;
use crate::error::FxError;

/// Target currency -> exchange rate.
pub type RateMap = BTreeMap<CurrencyCode, Decimal>;

/// Latest rates for a base currency as published on `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RateSnapshot {
    #[schema(value_type = f64, example = 1.0)]
    amount: Decimal,
    base: CurrencyCode,
    #[schema(value_type = String, example = "2024-01-15")]
    date: NaiveDate,
    #[schema(value_type = Object, example = json!({"EUR": 0.91, "GBP": 0.78}))]
    rates: RateMap,
}

impl RateSnapshot {
    pub fn new(amount: Decimal, base: CurrencyCode, date: NaiveDate, rates: RateMap) -> Self {
        Self {
            amount,
            base,
            date,
            rates,
        }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn base(&self) -> &CurrencyCode {
        &self.base
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn rates(&self) -> &RateMap {
        &self.rates
    }

    pub fn rate(&self, target: &CurrencyCode) -> Option<Decimal> {
        self.rates.get(target).copied()
    }
}

/// Result of converting an amount from `base` into one or more targets.
///
/// `rates` holds the converted amount per target, not the unit rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConversionResult {
    #[schema(value_type = f64, example = 100.0)]
    amount: Decimal,
    base: CurrencyCode,
    #[schema(value_type = String, example = "2024-01-15")]
    date: NaiveDate,
    #[schema(value_type = Object, example = json!({"EUR": 91.2}))]
    rates: RateMap,
}

impl ConversionResult {
    pub fn new(amount: Decimal, base: CurrencyCode, date: NaiveDate, rates: RateMap) -> Self {
        Self {
            amount,
            base,
            date,
            rates,
        }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn base(&self) -> &CurrencyCode {
        &self.base
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn rates(&self) -> &RateMap {
        &self.rates
    }

    /// Re-expresses an upstream quote for `amount` units of the base currency.
    ///
    /// The upstream quotes for its own `amount` (normally 1), so every value
    /// is multiplied by `amount / self.amount`.
    pub fn scaled_to(&self, amount: Decimal) -> Result<Self, FxError> {
        let overflow = || FxError::Validation(format!("Amount too large: {}", amount));

        let rates = self
            .rates
            .iter()
            .map(|(code, value)| {
                let scaled = value.checked_mul(amount).ok_or_else(overflow)?;
                let scaled = if self.amount.is_zero() || self.amount == Decimal::ONE {
                    scaled
                } else {
                    scaled.checked_div(self.amount).ok_or_else(overflow)?
                };
                Ok((code.clone(), scaled.normalize()))
            })
            .collect::<Result<RateMap, FxError>>()?;

        Ok(Self {
            amount,
            base: self.base.clone(),
            date: self.date,
            rates,
        })
    }
}

/// Rates for every published date between `start_date` and `end_date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistoricalRateSet {
    #[schema(value_type = f64, example = 1.0)]
    amount: Decimal,
    base: CurrencyCode,
    #[schema(value_type = String, example = "2024-01-01")]
    start_date: NaiveDate,
    #[schema(value_type = String, example = "2024-01-31")]
    end_date: NaiveDate,
    /// Ascending by date.
    #[schema(value_type = Object, example = json!({"2024-01-02": {"EUR": 0.91}}))]
    rates: BTreeMap<NaiveDate, RateMap>,
}

impl HistoricalRateSet {
    pub fn new(
        amount: Decimal,
        base: CurrencyCode,
        start_date: NaiveDate,
        end_date: NaiveDate,
        rates: BTreeMap<NaiveDate, RateMap>,
    ) -> Self {
        Self {
            amount,
            base,
            start_date,
            end_date,
            rates,
        }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn base(&self) -> &CurrencyCode {
        &self.base
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn rates(&self) -> &BTreeMap<NaiveDate, RateMap> {
        &self.rates
    }

    /// Returns one page of dates; everything except `rates` is carried over.
    ///
    /// A page past the last date yields an empty series.
    pub fn paginate(&self, page: PageRequest) -> Self {
        let rates = self
            .rates
            .iter()
            .skip(page.offset())
            .take(page.page_size())
            .map(|(date, rates)| (*date, rates.clone()))
            .collect();

        Self {
            amount: self.amount,
            base: self.base.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            rates,
        }
    }
}

/// Parses a `YYYY-MM-DD` calendar date supplied by a caller.
pub fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, FxError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| FxError::Validation(format!("Invalid {}: {:?}", field, raw)))
}
