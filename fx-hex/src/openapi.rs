//! OpenAPI specification and documentation.

#![allow(dead_code)] // Path functions are only used by utoipa for documentation generation

use fx_types::domain::{ConversionResult, CurrencyCode, HistoricalRateSet, RateSnapshot};
use fx_types::dto::{CircuitStatusResponse, ConvertRequest, HistoricalRatesQuery, LatestRatesQuery};
use utoipa::OpenApi;

// Documentation stubs for the handlers in `inbound::handlers`.

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = inline(serde_json::Value), example = json!({"status": "healthy"}))
    )
)]
async fn health() {}

/// Latest exchange rates
///
/// Served from a one-hour cache per base currency.
#[utoipa::path(
    get,
    path = "/api/currency/latest",
    tag = "rates",
    params(LatestRatesQuery),
    responses(
        (status = 200, description = "Latest rates", body = RateSnapshot),
        (status = 400, description = "Invalid base currency"),
        (status = 502, description = "Upstream provider failed"),
        (status = 503, description = "Circuit open, retry after the indicated delay")
    )
)]
async fn latest_rates() {}

/// Convert an amount between currencies
///
/// Conversions into TRY, PLN, THB and MXN are refused.
#[utoipa::path(
    post,
    path = "/api/currency/convert",
    tag = "rates",
    request_body = ConvertRequest,
    responses(
        (status = 200, description = "Converted amount keyed by target currency", body = ConversionResult),
        (status = 400, description = "Invalid input or unsupported target currency"),
        (status = 502, description = "Upstream provider failed"),
        (status = 503, description = "Circuit open, retry after the indicated delay")
    )
)]
async fn convert() {}

/// Historical rates for a date range
#[utoipa::path(
    get,
    path = "/api/currency/historical/{base}",
    tag = "rates",
    params(
        ("base" = String, Path, description = "Base currency code", example = "USD"),
        HistoricalRatesQuery
    ),
    responses(
        (status = 200, description = "One page of daily rates", body = HistoricalRateSet),
        (status = 400, description = "Invalid currency, dates or paging"),
        (status = 502, description = "Upstream provider failed"),
        (status = 503, description = "Circuit open, retry after the indicated delay")
    )
)]
async fn historical_rates() {}

/// Upstream circuit breaker status
#[utoipa::path(
    get,
    path = "/api/currency/circuit",
    tag = "operations",
    responses(
        (status = 200, description = "Current breaker state", body = CircuitStatusResponse)
    )
)]
async fn circuit_status() {}

/// OpenAPI documentation for the Currency API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Currency Conversion Service API",
        version = "1.0.0",
        description = "Latest rates, conversions and historical series backed by an upstream exchange-rate provider.\n\n## Errors\n\nFailures use a uniform body:\n\n```\n{\"error\": \"...\", \"code\": 503}\n```\n\n`503` responses carry a `Retry-After` header while the upstream circuit is open.",
        license(name = "MIT"),
    ),
    paths(
        health,
        latest_rates,
        convert,
        historical_rates,
        circuit_status,
    ),
    components(
        schemas(
            CurrencyCode,
            RateSnapshot,
            ConversionResult,
            HistoricalRateSet,
            ConvertRequest,
            CircuitStatusResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rates", description = "Exchange rates and conversions"),
        (name = "operations", description = "Operational introspection"),
    )
)]
pub struct ApiDoc;
