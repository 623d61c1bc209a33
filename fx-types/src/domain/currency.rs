//! Currency code value type.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::FxError;

/// Target currencies that conversions are not offered for.
pub const DISALLOWED_TARGETS: [&str; 4] = ["TRY", "PLN", "THB", "MXN"];

/// ISO-4217 style three-letter currency code, always upper case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(example = "USD")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parses and normalizes a currency code.
    ///
    /// # Validation
    /// - Code cannot be empty or blank
    /// - Code must be exactly three ASCII letters
    pub fn parse(raw: &str) -> Result<Self, FxError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(FxError::Validation("Currency code is required".into()));
        }
        if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(FxError::Validation(format!(
                "Invalid currency code: {}",
                trimmed
            )));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Parses an optional code where an absent or blank value means "no code".
    pub fn parse_optional(raw: Option<&str>) -> Result<Option<Self>, FxError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(None),
            Some(code) => Self::parse(code).map(Some),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether conversions into this currency are refused by policy.
    pub fn is_conversion_disallowed(&self) -> bool {
        DISALLOWED_TARGETS.contains(&self.0.as_str())
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = FxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = FxError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl AsRef<str> for CurrencyCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
