//! # FX Types
//!
//! Domain types and port traits for the currency conversion service.
//! This crate has ZERO external IO dependencies - only data structures,
//! validation rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (CurrencyCode, RateSnapshot, HistoricalRateSet)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for API boundaries
//! - `error/` - Failure taxonomy and HTTP-facing application errors

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    ConversionResult, CurrencyCode, DISALLOWED_TARGETS, HistoricalRateSet, PageRequest, RateMap,
    RateSnapshot, parse_date,
};
pub use dto::*;
pub use error::{AppError, FxError};
pub use ports::RateProvider;
