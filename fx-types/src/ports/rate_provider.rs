//! Upstream rate provider port.
//!
//! Implementations issue a single request per call; retrying, caching and
//! circuit breaking are layered on top by the application service.

use chrono::NaiveDate;

use crate::domain::{ConversionResult, CurrencyCode, HistoricalRateSet, RateSnapshot};
use crate::error::FxError;

/// Port trait for foreign-exchange rate providers.
///
/// Failures must be classified: network errors, timeouts and 5xx responses
/// as [`FxError::Transient`], undecodable bodies as [`FxError::Parse`].
#[async_trait::async_trait]
pub trait RateProvider: Send + Sync {
    /// Latest rates, optionally relative to `base`.
    async fn fetch_latest(&self, base: Option<&CurrencyCode>) -> Result<RateSnapshot, FxError>;

    /// Latest rate for a single currency pair, quoted for the provider's unit amount.
    async fn fetch_pair(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> Result<ConversionResult, FxError>;

    /// Every published rate set between `start` and `end` inclusive.
    async fn fetch_range(
        &self,
        base: &CurrencyCode,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HistoricalRateSet, FxError>;
}
