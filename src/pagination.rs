//! Shared pagination for license and usage listings.
//!
//! Every list endpoint takes the same `limit`/`offset` window from the
//! query string and echoes the clamped values back in the response, so
//! dashboards can page without guessing the server's caps.

use serde::{Deserialize, Serialize};

/// Page window requested by a list caller. Extracted from the query
/// string next to the endpoint's filter parameters.
#[derive(Debug, Deserialize, Default)]
pub struct PaginationQuery {
    /// Requested page size (default 50, capped at 100)
    #[serde(default)]
    pub limit: Option<i64>,
    /// Rows to skip before the page starts (default 0)
    #[serde(default)]
    pub offset: Option<i64>,
}

impl PaginationQuery {
    /// Effective page size, clamped to 1..=100.
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 100)
    }

    /// Effective offset, never negative.
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// One page of results plus the totals needed to page further.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    /// Matching rows across every page
    pub total: i64,
    /// The clamped page size actually applied
    pub limit: i64,
    /// The offset actually applied
    pub offset: i64,
}

impl<T> Paginated<T> {
    /// Wrap a fetched page, echoing the clamped window that produced it.
    pub fn page(items: Vec<T>, total: i64, query: &PaginationQuery) -> Self {
        Self {
            items,
            total,
            limit: query.limit(),
            offset: query.offset(),
        }
    }
}
