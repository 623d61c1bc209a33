//! Provider response bodies and their conversion into domain types.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use fx_types::{ConversionResult, CurrencyCode, FxError, HistoricalRateSet, RateMap, RateSnapshot};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Body of `GET latest`, with or without `symbols`.
#[derive(Debug, Deserialize)]
pub(crate) struct LatestBody {
    #[serde(default = "unit_amount")]
    pub amount: Decimal,
    pub base: CurrencyCode,
    pub date: NaiveDate,
    pub rates: RateMap,
}

/// Body of `GET <start>..<end>`.
#[derive(Debug, Deserialize)]
pub(crate) struct RangeBody {
    #[serde(default = "unit_amount")]
    pub amount: Decimal,
    pub base: CurrencyCode,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rates: BTreeMap<NaiveDate, RateMap>,
}

/// Error body returned with 4xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: String,
}

fn unit_amount() -> Decimal {
    Decimal::ONE
}

impl From<LatestBody> for RateSnapshot {
    fn from(body: LatestBody) -> Self {
        RateSnapshot::new(body.amount, body.base, body.date, body.rates)
    }
}

impl From<LatestBody> for ConversionResult {
    fn from(body: LatestBody) -> Self {
        ConversionResult::new(body.amount, body.base, body.date, body.rates)
    }
}

impl From<RangeBody> for HistoricalRateSet {
    fn from(body: RangeBody) -> Self {
        HistoricalRateSet::new(
            body.amount,
            body.base,
            body.start_date,
            body.end_date,
            body.rates,
        )
    }
}

/// Decodes a success body; anything unreadable is a [`FxError::Parse`].
pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, FxError> {
    serde_json::from_slice(bytes).map_err(|e| FxError::Parse(e.to_string()))
}

/// Best-effort message from a rejection body.
pub(crate) fn rejection_message(bytes: &[u8]) -> String {
    match serde_json::from_slice::<ErrorBody>(bytes) {
        Ok(body) => body.message,
        Err(_) => String::from_utf8_lossy(bytes).trim().to_string(),
    }
}
