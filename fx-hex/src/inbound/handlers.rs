//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use fx_types::{
    AppError, ConvertRequest, FxError, HistoricalRatesQuery, LatestRatesQuery, RateProvider,
};

use crate::ConversionService;

/// Application state shared across handlers.
pub struct AppState<P: RateProvider> {
    pub service: ConversionService<P>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl From<FxError> for ApiError {
    fn from(err: FxError) -> Self {
        ApiError(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(AppError::BadRequest(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(AppError::BadRequest(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, retry_after) = match &self.0 {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::ServiceUnavailable {
                message,
                retry_after_seconds,
            } => (
                StatusCode::SERVICE_UNAVAILABLE,
                message.clone(),
                Some(*retry_after_seconds),
            ),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg.clone(), None),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), None),
        };

        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %message, "request failed");
        }

        let mut body = serde_json::json!({
            "error": message,
            "code": status.as_u16()
        });
        if let Some(seconds) = retry_after {
            body["retry_after_seconds"] = seconds.into();
        }

        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Latest rates, optionally for a base currency.
#[tracing::instrument(skip(state))]
pub async fn latest_rates<P: RateProvider>(
    State(state): State<Arc<AppState<P>>>,
    query: Result<Query<LatestRatesQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let snapshot = state
        .service
        .get_latest_rates(query.base.as_deref())
        .await?;
    Ok(Json(snapshot))
}

/// Convert an amount between two currencies.
#[tracing::instrument(skip(state))]
pub async fn convert<P: RateProvider>(
    State(state): State<Arc<AppState<P>>>,
    req: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = req?;
    let result = state
        .service
        .convert(&req.from_currency, &req.to_currency, req.amount)
        .await?;
    Ok(Json(result))
}

/// Paginated historical rates for a base currency.
#[tracing::instrument(skip(state))]
pub async fn historical_rates<P: RateProvider>(
    State(state): State<Arc<AppState<P>>>,
    Path(base): Path<String>,
    query: Result<Query<HistoricalRatesQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let rates = state
        .service
        .get_historical_rates(
            &base,
            &query.start_date,
            &query.end_date,
            query.page,
            query.page_size,
        )
        .await?;
    Ok(Json(rates))
}

/// Upstream circuit breaker status.
pub async fn circuit_status<P: RateProvider>(
    State(state): State<Arc<AppState<P>>>,
) -> impl IntoResponse {
    Json(state.service.circuit_status())
}
