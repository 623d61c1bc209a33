//! Domain types for currency rates.

mod currency;
mod page;
mod rates;

pub use currency::{CurrencyCode, DISALLOWED_TARGETS};
pub use page::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE, PageRequest};
pub use rates::{ConversionResult, HistoricalRateSet, RateMap, RateSnapshot, parse_date};
