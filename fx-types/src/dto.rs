//! Data Transfer Objects (DTOs) for requests and responses.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE};

// ─────────────────────────────────────────────────────────────────────────────
// Rate DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Query for the latest rates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LatestRatesQuery {
    /// Base currency; the provider default is used when absent
    #[param(example = "USD")]
    pub base: Option<String>,
}

/// Request to convert an amount between two currencies.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRequest {
    /// Source currency code
    #[schema(example = "USD")]
    pub from_currency: String,
    /// Target currency code
    #[schema(example = "EUR")]
    pub to_currency: String,
    /// Amount of the source currency (must be positive)
    #[schema(value_type = f64, example = 100.0)]
    pub amount: Decimal,
}

/// Query for a paginated historical series.
#[derive(Debug, Clone, Serialize, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct HistoricalRatesQuery {
    /// First date of the range (YYYY-MM-DD)
    #[param(example = "2024-01-01")]
    pub start_date: String,
    /// Last date of the range (YYYY-MM-DD)
    #[param(example = "2024-01-31")]
    pub end_date: String,
    /// 1-based page number
    #[serde(default = "default_page")]
    #[param(example = 1)]
    pub page: i64,
    /// Dates per page
    #[serde(default = "default_page_size")]
    #[param(example = 10)]
    pub page_size: i64,
}

fn default_page() -> i64 {
    DEFAULT_PAGE
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

// ─────────────────────────────────────────────────────────────────────────────
// Operational DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Snapshot of the upstream circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CircuitStatusResponse {
    /// One of `closed`, `open`, `half_open`
    #[schema(example = "closed")]
    pub state: String,
    /// Consecutive upstream failures recorded while closed
    #[schema(example = 0)]
    pub consecutive_failures: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_request_uses_camel_case() {
        let req: ConvertRequest = serde_json::from_str(
            r#"{"fromCurrency": "USD", "toCurrency": "EUR", "amount": 12.5}"#,
        )
        .unwrap();
        assert_eq!(req.from_currency, "USD");
        assert_eq!(req.to_currency, "EUR");
        assert_eq!(req.amount, Decimal::new(125, 1));
    }

    #[test]
    fn test_historical_query_defaults() {
        let query: HistoricalRatesQuery =
            serde_json::from_str(r#"{"startDate": "2024-01-01", "endDate": "2024-01-31"}"#)
                .unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, 10);
    }
}
