//! Filter/sort/page state of the task list and its URL query-string encoding.

use std::{fmt, num::NonZeroU32};

use shared::domain::{SortColumn, SortDirection, TaskStatus};
use tracing::debug;
use url::form_urlencoded;

pub const STATUS_KEY: &str = "status";
pub const ORDER_BY_KEY: &str = "orderBy";
pub const SORT_DIRECTION_KEY: &str = "sortDirection";
pub const PAGE_KEY: &str = "page";

/// List view state as carried by the URL.
///
/// A `None` field means the key is absent from the query string. The
/// serialization is canonical: keys are always written in the order
/// `status`, `orderBy`, `sortDirection`, `page`, so two equal states always
/// produce the same string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QueryState {
    status: Option<TaskStatus>,
    order_by: Option<SortColumn>,
    sort_direction: Option<SortDirection>,
    page: Option<NonZeroU32>,
}

impl QueryState {
    /// Parses a query string, with or without the leading `?`.
    ///
    /// Never fails. Unknown keys and values outside the known sets are
    /// dropped, and a `page` that is not a positive integer reads as absent
    /// (page 1). When a key repeats, the first occurrence wins.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut state = Self::default();
        let mut seen_status = false;
        let mut seen_order_by = false;
        let mut seen_direction = false;
        let mut seen_page = false;

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match &*key {
                STATUS_KEY if !seen_status => {
                    seen_status = true;
                    state.status = parse_known(STATUS_KEY, &value);
                }
                ORDER_BY_KEY if !seen_order_by => {
                    seen_order_by = true;
                    state.order_by = parse_known(ORDER_BY_KEY, &value);
                }
                SORT_DIRECTION_KEY if !seen_direction => {
                    seen_direction = true;
                    state.sort_direction = parse_known(SORT_DIRECTION_KEY, &value);
                }
                PAGE_KEY if !seen_page => {
                    seen_page = true;
                    state.page = parse_page(&value);
                }
                STATUS_KEY | ORDER_BY_KEY | SORT_DIRECTION_KEY | PAGE_KEY => {}
                other => debug!(key = other, "ignoring unknown query parameter"),
            }
        }

        if state.order_by.is_none() {
            state.sort_direction = None;
        }
        state
    }

    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(4);
        if let Some(status) = self.status {
            pairs.push((STATUS_KEY, status.as_str().to_string()));
        }
        if let Some(order_by) = self.order_by {
            pairs.push((ORDER_BY_KEY, order_by.as_str().to_string()));
            if let Some(direction) = self.sort_direction {
                pairs.push((SORT_DIRECTION_KEY, direction.as_str().to_string()));
            }
        }
        if let Some(page) = self.page {
            pairs.push((PAGE_KEY, page.to_string()));
        }
        pairs
    }

    /// Canonical query string without the leading `?`; empty for the default state.
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.to_pairs() {
            serializer.append_pair(key, &value);
        }
        serializer.finish()
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn status(&self) -> Option<TaskStatus> {
        self.status
    }

    pub fn order_by(&self) -> Option<SortColumn> {
        self.order_by
    }

    pub fn sort_direction(&self) -> Option<SortDirection> {
        self.sort_direction
    }

    /// Direction used for display: ascending unless the URL says otherwise.
    pub fn effective_sort_direction(&self) -> Option<SortDirection> {
        self.order_by
            .map(|_| self.sort_direction.unwrap_or(SortDirection::Asc))
    }

    pub fn page(&self) -> u32 {
        self.page.map_or(1, NonZeroU32::get)
    }

    pub fn explicit_page(&self) -> Option<NonZeroU32> {
        self.page
    }

    pub fn with_status(&self, status: Option<TaskStatus>) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    /// Selecting the current sort column flips its direction (`asc` to
    /// `desc`, anything else to `asc`); selecting another column sorts it
    /// ascending. The page is left untouched.
    pub fn with_sort_column(&self, column: SortColumn) -> Self {
        let sort_direction = if self.order_by == Some(column) {
            match self.sort_direction {
                Some(SortDirection::Asc) => SortDirection::Desc,
                _ => SortDirection::Asc,
            }
        } else {
            SortDirection::Asc
        };
        Self {
            order_by: Some(column),
            sort_direction: Some(sort_direction),
            ..self.clone()
        }
    }

    /// Pages past the end are kept as-is; the server decides what they mean.
    pub fn with_page(&self, page: NonZeroU32) -> Self {
        Self {
            page: Some(page),
            ..self.clone()
        }
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

fn parse_known<T>(key: &str, value: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    if value.is_empty() {
        return None;
    }
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            debug!(key, value, "ignoring unrecognised query value");
            None
        }
    }
}

fn parse_page(value: &str) -> Option<NonZeroU32> {
    value.trim().parse::<NonZeroU32>().ok()
}

#[cfg(test)]
#[path = "tests/query_state_tests.rs"]
mod tests;
