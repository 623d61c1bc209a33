//! # FX Client SDK
//!
//! A typed Rust client for the Currency Conversion API.

use fx_types::{
    CircuitStatusResponse, ConversionResult, ConvertRequest, HistoricalRateSet, RateSnapshot,
};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// True when the server refused the call because the upstream circuit is open.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ClientError::Api { status: 503, .. })
    }
}

/// Currency API client.
pub struct FxClient {
    base_url: String,
    http: Client,
}

impl FxClient {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    /// Checks if the API is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    /// Latest rates, relative to `base` or the provider default.
    pub async fn latest(&self, base: Option<&str>) -> Result<RateSnapshot, ClientError> {
        let query: Vec<(&str, String)> = base.map(|b| ("base", b.to_string())).into_iter().collect();
        self.get("/api/currency/latest", &query).await
    }

    /// Converts `amount` of `from` into `to`.
    pub async fn convert(
        &self,
        from: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<ConversionResult, ClientError> {
        let req = ConvertRequest {
            from_currency: from.to_string(),
            to_currency: to.to_string(),
            amount,
        };
        self.post("/api/currency/convert", &req).await
    }

    /// One page of daily rates between `start` and `end` (YYYY-MM-DD).
    pub async fn historical(
        &self,
        base: &str,
        start: &str,
        end: &str,
        page: i64,
        page_size: i64,
    ) -> Result<HistoricalRateSet, ClientError> {
        let query = [
            ("startDate", start.to_string()),
            ("endDate", end.to_string()),
            ("page", page.to_string()),
            ("pageSize", page_size.to_string()),
        ];
        self.get(&format!("/api/currency/historical/{}", base), &query)
            .await
    }

    /// Current state of the upstream circuit breaker.
    pub async fn circuit(&self) -> Result<CircuitStatusResponse, ClientError> {
        self.get("/api/currency/circuit", &[]).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .unwrap_or(body);
            Err(ClientError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    use axum::extract::{Path, Query};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use rust_decimal_macros::dec;
    use serde_json::{Value, json};

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    fn stub_api() -> Router {
        Router::new()
            .route("/health", get(|| async { Json(json!({ "status": "healthy" })) }))
            .route(
                "/api/currency/latest",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    Json(json!({
                        "amount": 1.0,
                        "base": q.get("base").cloned().unwrap_or_else(|| "EUR".into()),
                        "date": "2024-01-15",
                        "rates": { "GBP": 0.78 },
                    }))
                }),
            )
            .route(
                "/api/currency/convert",
                post(|Json(body): Json<Value>| async move {
                    if body["toCurrency"] == "TRY" {
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(json!({ "error": "conversion to TRY is not supported", "code": 400 })),
                        );
                    }
                    (
                        StatusCode::OK,
                        Json(json!({
                            "amount": body["amount"],
                            "base": body["fromCurrency"],
                            "date": "2024-01-15",
                            "rates": { "EUR": 87.5 },
                        })),
                    )
                }),
            )
            .route(
                "/api/currency/historical/{base}",
                get(
                    |Path(base): Path<String>, Query(q): Query<HashMap<String, String>>| async move {
                        Json(json!({
                            "amount": 1.0,
                            "base": base,
                            "start_date": q["startDate"],
                            "end_date": q["endDate"],
                            "rates": { "2024-01-02": { "EUR": 0.92 } },
                        }))
                    },
                ),
            )
            .route(
                "/api/currency/circuit",
                get(|| async {
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        Json(json!({ "error": "circuit open", "code": 503 })),
                    )
                }),
            )
    }

    #[test]
    fn test_client_creation() {
        let client = FxClient::new("http://localhost:3000");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_client_with_trailing_slash() {
        let client = FxClient::new("http://localhost:3000/");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[tokio::test]
    async fn test_health_and_latest() {
        let client = FxClient::new(spawn(stub_api()).await);

        assert!(client.health().await.unwrap());

        let snapshot = client.latest(Some("USD")).await.unwrap();
        assert_eq!(snapshot.base().as_str(), "USD");
        assert_eq!(snapshot.rates().len(), 1);

        let snapshot = client.latest(None).await.unwrap();
        assert_eq!(snapshot.base().as_str(), "EUR");
    }

    #[tokio::test]
    async fn test_convert_and_historical() {
        let client = FxClient::new(spawn(stub_api()).await);

        let result = client.convert("USD", "EUR", dec!(100)).await.unwrap();
        assert_eq!(result.amount(), dec!(100));
        assert_eq!(result.base().as_str(), "USD");

        let series = client
            .historical("USD", "2024-01-01", "2024-01-31", 1, 10)
            .await
            .unwrap();
        assert_eq!(series.base().as_str(), "USD");
        assert_eq!(series.start_date().to_string(), "2024-01-01");
        assert_eq!(series.rates().len(), 1);
    }

    #[tokio::test]
    async fn test_api_errors_carry_status_and_message() {
        let client = FxClient::new(spawn(stub_api()).await);

        match client.convert("USD", "TRY", dec!(1)).await {
            Err(ClientError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert!(message.contains("TRY"));
            }
            other => panic!("expected api error, got {other:?}"),
        }

        let err = client.circuit().await.unwrap_err();
        assert!(err.is_circuit_open());
    }
}
