//! Conversion Application Service
//!
//! Orchestrates rate lookups through the provider port, guarded by the
//! shared cache, retry policy and circuit breaker.
//! Contains NO infrastructure logic - pure orchestration and validation.

use std::sync::Arc;
use std::time::Duration;

use fx_resilience::{CircuitBreaker, RateCache, RetryPolicy};
use fx_types::{
    CircuitStatusResponse, ConversionResult, CurrencyCode, FxError, HistoricalRateSet,
    PageRequest, RateProvider, RateSnapshot, parse_date,
};
use rust_decimal::Decimal;
use tracing::{debug, instrument};

/// Default lifetime of cached latest rates.
pub const DEFAULT_LATEST_TTL: Duration = Duration::from_secs(3600);

/// Tunables for the service's own behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    /// How long latest-rate snapshots stay cached.
    pub latest_ttl: Duration,
    /// Retry policy applied to every upstream call.
    pub retry: RetryPolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            latest_ttl: DEFAULT_LATEST_TTL,
            retry: RetryPolicy::default(),
        }
    }
}

/// Application service for rate lookups and conversions.
///
/// Generic over `P: RateProvider` - the upstream adapter is injected at
/// compile time. The cache and breaker are shared handles so every service
/// instance in the process sees the same upstream health and cached data.
pub struct ConversionService<P: RateProvider> {
    provider: P,
    config: ServiceConfig,
    cache: Arc<RateCache<RateSnapshot>>,
    breaker: Arc<CircuitBreaker>,
}

impl<P: RateProvider> ConversionService<P> {
    pub fn new(
        provider: P,
        config: ServiceConfig,
        cache: Arc<RateCache<RateSnapshot>>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            provider,
            config,
            cache,
            breaker,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Rate Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Latest rates for `base`, or for the provider's default base when absent.
    ///
    /// Served from the cache while fresh. The breaker guards the lookup as a
    /// whole, so an open circuit rejects cached keys too, but only an actual
    /// fetch is counted.
    #[instrument(skip(self))]
    pub async fn get_latest_rates(&self, base: Option<&str>) -> Result<RateSnapshot, FxError> {
        let base = CurrencyCode::parse_optional(base)?;
        let key = format!(
            "latest:{}",
            base.as_ref().map(CurrencyCode::as_str).unwrap_or_default()
        );

        let permit = self.breaker.try_acquire()?;
        let snapshot = self
            .cache
            .get_or_try_fetch(&key, self.config.latest_ttl, move || async move {
                let result = self
                    .config
                    .retry
                    .execute(|| self.provider.fetch_latest(base.as_ref()))
                    .await;
                permit.record(&result);
                result
            })
            .await?;

        Ok(Arc::unwrap_or_clone(snapshot))
    }

    /// Converts `amount` of `from` into `to` at the latest rate.
    ///
    /// Input checks run before the breaker, so bad requests never touch
    /// upstream accounting. Results are not cached.
    #[instrument(skip(self))]
    pub async fn convert(
        &self,
        from: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<ConversionResult, FxError> {
        let from = CurrencyCode::parse(from)?;
        let to = CurrencyCode::parse(to)?;

        if amount <= Decimal::ZERO {
            return Err(FxError::Validation("Amount must be positive".into()));
        }

        if to.is_conversion_disallowed() {
            return Err(FxError::Unsupported(format!(
                "Conversion to {} is not supported",
                to
            )));
        }

        let quote = self
            .breaker
            .call(|| {
                self.config
                    .retry
                    .execute(|| self.provider.fetch_pair(&from, &to))
            })
            .await?;

        quote.scaled_to(amount)
    }

    /// One page of the daily rates between two dates, inclusive.
    #[instrument(skip(self))]
    pub async fn get_historical_rates(
        &self,
        base: &str,
        start_date: &str,
        end_date: &str,
        page: i64,
        page_size: i64,
    ) -> Result<HistoricalRateSet, FxError> {
        let base = CurrencyCode::parse(base)?;
        let start = parse_date(start_date, "start date")?;
        let end = parse_date(end_date, "end date")?;

        if start > end {
            return Err(FxError::Validation(format!(
                "Start date {} is after end date {}",
                start, end
            )));
        }

        let page = PageRequest::new(page, page_size)?;

        let series = self
            .breaker
            .call(|| {
                self.config
                    .retry
                    .execute(|| self.provider.fetch_range(&base, start, end))
            })
            .await?;

        debug!(
            dates = series.rates().len(),
            page = page.page(),
            "paginating historical rates"
        );
        Ok(series.paginate(page))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Current breaker state for operators.
    pub fn circuit_status(&self) -> CircuitStatusResponse {
        let status = self.breaker.status();
        CircuitStatusResponse {
            state: status.state.as_str().to_string(),
            consecutive_failures: status.consecutive_failures,
        }
    }
}
