use std::fmt::Display;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::Serialize;

/// The field search results are sorted by.
#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy, Hash)]
pub enum SortField {
    /// Star count
    Stars,
}

impl Display for SortField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortField::Stars => write!(f, "stars"),
        }
    }
}

/// The direction search results are sorted in.
#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy, Hash)]
pub enum SortOrder {
    /// Largest first
    Desc,
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortOrder::Desc => write!(f, "desc"),
        }
    }
}

/// Returns the start of the trailing window of `days` days ending at `now`.
///
/// Windows reaching back before the Unix epoch start at the epoch.
pub fn trailing_window_start(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    TimeDelta::try_days(days as i64)
        .and_then(|window| now.checked_sub_signed(window))
        .map_or(DateTime::<Utc>::UNIX_EPOCH, |start| {
            start.max(DateTime::<Utc>::UNIX_EPOCH)
        })
}

/// A search for recently created repositories being made to the GitHub API
#[derive(Debug, Serialize, PartialEq, Eq, Clone, Hash)]
pub struct TrendingQuery {
    /// Only repositories created strictly after this date match.
    pub(crate) created_after: NaiveDate,

    /// The sort field.
    pub(crate) sort: SortField,

    /// The sort order.
    pub(crate) order: SortOrder,

    /// The number of repositories to return.
    pub(crate) first: u16,

    /// The cursor for pagination.
    pub(crate) after: Option<String>,
}

impl TrendingQuery {
    /// The largest page size accepted by the GitHub search API.
    pub const MAX_PAGE_SIZE: u16 = 100;

    /// Creates a new `TrendingQuery`.
    pub fn new(
        created_after: NaiveDate,
        sort: SortField,
        order: SortOrder,
        first: u16,
        after: Option<String>,
    ) -> Self {
        Self {
            created_after,
            sort,
            order,
            first: first.min(Self::MAX_PAGE_SIZE),
            after,
        }
    }

    /// Creates a query for repositories created within the last `days` days, most starred first.
    pub fn created_within_days(days: u32, now: DateTime<Utc>, first: u16) -> Self {
        let created_after = trailing_window_start(now, days).date_naive();

        Self::new(created_after, SortField::Stars, SortOrder::Desc, first, None)
    }

    /// Creates the query of the next page, starting after the given cursor.
    pub fn next_page(&self, after: String, first: u16) -> Self {
        Self {
            first: first.min(Self::MAX_PAGE_SIZE),
            after: Some(after),
            ..self.clone()
        }
    }

    /// Renders the GitHub search string of the query.
    pub fn search_string(&self) -> String {
        format!(
            "created:>{} sort:{}-{}",
            self.created_after.format("%Y-%m-%d"),
            self.sort,
            self.order
        )
    }

    /// Creates a dummy `TrendingQuery` for testing purposes.
    #[cfg(test)]
    pub(crate) fn dummy() -> Self {
        Self::new(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            SortField::Stars,
            SortOrder::Desc,
            10,
            None,
        )
    }
}

impl Display for TrendingQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TrendingQuery: query={}, first={}, after={:?}",
            self.search_string(),
            self.first,
            self.after
        )
    }
}
