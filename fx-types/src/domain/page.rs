//! Page selection over an ordered series.

use crate::error::FxError;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// A validated, 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    /// Validates caller-supplied paging values; both must be positive.
    pub fn new(page: i64, page_size: i64) -> Result<Self, FxError> {
        let page = u32::try_from(page)
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| FxError::Validation(format!("Page must be positive, got {}", page)))?;
        let page_size = u32::try_from(page_size)
            .ok()
            .filter(|s| *s > 0)
            .ok_or_else(|| {
                FxError::Validation(format!("Page size must be positive, got {}", page_size))
            })?;

        Ok(Self { page, page_size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size as usize
    }

    /// Number of entries preceding this page.
    pub fn offset(&self) -> usize {
        (self.page as usize - 1).saturating_mul(self.page_size as usize)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE as u32,
            page_size: DEFAULT_PAGE_SIZE as u32,
        }
    }
}
