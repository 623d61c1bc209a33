//! # FX Upstream
//!
//! Outbound adapter implementing the `RateProvider` port against a
//! Frankfurter-compatible HTTP API:
//!
//! - `GET {base}latest[?base=X[&symbols=Y]]`
//! - `GET {base}<start>..<end>?base=X`
//!
//! Every call is a single request bounded by the configured timeout.
//! Retries, caching and circuit breaking live in the application service.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use fx_types::{ConversionResult, CurrencyCode, FxError, HistoricalRateSet, RateProvider, RateSnapshot};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

mod wire;


use wire::{LatestBody, RangeBody};

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the upstream provider.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Provider root, e.g. `https://api.frankfurter.app/`.
    pub base_url: String,
    /// Upper bound for one request, response body included.
    pub timeout: Duration,
}

impl UpstreamConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// reqwest-backed [`RateProvider`].
#[derive(Debug, Clone)]
pub struct HttpRateClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRateClient {
    /// Builds the client; fails only if the TLS backend cannot initialize.
    pub fn new(config: UpstreamConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: normalize_base_url(&config.base_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn latest_url(&self, base: Option<&CurrencyCode>, symbols: Option<&CurrencyCode>) -> String {
        let mut url = format!("{}latest", self.base_url);
        if let Some(base) = base {
            url.push_str("?base=");
            url.push_str(base.as_str());
            if let Some(symbols) = symbols {
                url.push_str("&symbols=");
                url.push_str(symbols.as_str());
            }
        }
        url
    }

    fn range_url(&self, base: &CurrencyCode, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}{}..{}?base={}",
            self.base_url,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d"),
            base
        )
    }

    /// Issues one GET and classifies the outcome.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FxError> {
        debug!(url, "requesting upstream");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;

        if status.is_success() {
            return wire::decode(&body);
        }

        let message = wire::rejection_message(&body);
        warn!(url, status = status.as_u16(), %message, "upstream returned an error status");
        Err(status_error(status, message))
    }
}

#[async_trait]
impl RateProvider for HttpRateClient {
    #[instrument(skip(self, base), fields(base = ?base.map(CurrencyCode::as_str)))]
    async fn fetch_latest(&self, base: Option<&CurrencyCode>) -> Result<RateSnapshot, FxError> {
        let url = self.latest_url(base, None);
        self.get_json::<LatestBody>(&url).await.map(Into::into)
    }

    #[instrument(skip(self, from, to), fields(from = %from, to = %to))]
    async fn fetch_pair(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> Result<ConversionResult, FxError> {
        let url = self.latest_url(Some(from), Some(to));
        self.get_json::<LatestBody>(&url).await.map(Into::into)
    }

    #[instrument(skip(self, base), fields(base = %base))]
    async fn fetch_range(
        &self,
        base: &CurrencyCode,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HistoricalRateSet, FxError> {
        let url = self.range_url(base, start, end);
        self.get_json::<RangeBody>(&url).await.map(Into::into)
    }
}

fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    format!("{}/", trimmed)
}

/// Every transport failure is transient, timeouts included.
fn transport_error(err: reqwest::Error) -> FxError {
    if err.is_timeout() {
        FxError::Transient(format!("upstream timed out: {}", err))
    } else {
        FxError::Transient(err.to_string())
    }
}

fn status_error(status: StatusCode, message: String) -> FxError {
    if status == StatusCode::TOO_MANY_REQUESTS || !status.is_client_error() {
        FxError::Transient(format!("upstream returned {}: {}", status, message))
    } else {
        FxError::UpstreamRejected {
            status: status.as_u16(),
            message,
        }
    }
}
