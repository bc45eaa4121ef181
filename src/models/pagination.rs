//! Pagination types
//!
//! Page numbers come straight from the query string and are never trusted:
//! anything that does not parse selects the first page, and numbers outside
//! `1..=total_pages` are clamped to the nearest end.

use serde::{Deserialize, Serialize};

/// Posts shown per feed page
pub const POSTS_PER_PAGE: u32 = 10;

/// Resolved pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    /// Page number (1-indexed, always valid for the result it was resolved against)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl ListParams {
    /// Resolve a raw `page` query value against the number of available items.
    pub fn resolve(raw_page: Option<&str>, total: i64, per_page: u32) -> Self {
        let per_page = per_page.max(1);
        let last = total_pages(total, per_page) as i64;
        let requested = parse_page_number(raw_page);
        Self {
            page: requested.clamp(1, last) as u32,
            per_page,
        }
    }

    /// Calculate the offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Parse a page number leniently; missing or malformed input means page 1.
pub fn parse_page_number(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok()).unwrap_or(1)
}

/// Number of pages for `total` items; an empty listing still has one page.
pub fn total_pages(total: i64, per_page: u32) -> u32 {
    let per_page = per_page.max(1) as i64;
    let total = total.max(0);
    (((total + per_page - 1) / per_page).max(1)).min(u32::MAX as i64) as u32
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    /// Current page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
    /// Number of pages (at least 1)
    pub total_pages: u32,
    /// Whether a next page exists
    pub has_next: bool,
    /// Whether a previous page exists
    pub has_prev: bool,
}

impl<T> PagedResult<T> {
    /// Create a new paginated result
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        let total_pages = total_pages(total, params.per_page);
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
            total_pages,
            has_next: params.page < total_pages,
            has_prev: params.page > 1,
        }
    }

    /// Check if the result is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
