//! # FX Hex
//!
//! Application service layer and HTTP adapter for the currency conversion
//! service.
//!
//! ## Architecture
//!
//! - `service/` - Application service (validation, cache, retry, breaker, pagination)
//! - `inbound/` - HTTP adapter (Axum server)
//! - `openapi/` - OpenAPI document served alongside the API
//!
//! The service is generic over `P: RateProvider`, allowing different
//! upstream adapters to be injected.

pub mod inbound;
pub mod openapi;
pub mod service;

#[cfg(test)]
mod service_tests;

pub use service::{ConversionService, DEFAULT_LATEST_TTL, ServiceConfig};
