//! Pagination and listing order.

use serde::{Deserialize, Serialize};

/// Limit applied when none (or an out-of-range one) is requested.
pub const DEFAULT_LIMIT: u32 = 10;

/// Largest limit a caller may request.
pub const MAX_LIMIT: u32 = 100;

/// A resolved page request.
///
/// Raw page/limit input never fails: out-of-range values fall back to the
/// defaults instead of being rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPagination")]
pub struct Pagination {
    page: u32,
    limit: u32,
}

/// Wire form of a page request; resolved through [`Pagination::new`].
#[derive(Deserialize)]
struct RawPagination {
    #[serde(default)]
    page: Option<i64>,
    #[serde(default)]
    limit: Option<i64>,
}

impl From<RawPagination> for Pagination {
    fn from(raw: RawPagination) -> Self {
        Self::new(raw.page, raw.limit)
    }
}

impl Pagination {
    /// Resolve raw input with the standard bounds.
    ///
    /// `page < 1` becomes 1; a limit outside `1..=100` becomes 10.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self::with_bounds(page, limit, DEFAULT_LIMIT, MAX_LIMIT)
    }

    /// Resolve raw input against configured bounds.
    pub fn with_bounds(
        page: Option<i64>,
        limit: Option<i64>,
        default_limit: u32,
        max_limit: u32,
    ) -> Self {
        let page = match page {
            Some(p) if p >= 1 => p.min(u32::MAX as i64) as u32,
            _ => 1,
        };
        let limit = match limit {
            Some(l) if l >= 1 && l <= max_limit as i64 => l as u32,
            _ => default_limit,
        };
        Self { page, limit }
    }

    /// Parse the query-string form, e.g. `?page=2&limit=20`.
    pub fn from_query(page: Option<&str>, limit: Option<&str>) -> Self {
        let parse = |s: Option<&str>| s.and_then(|v| v.trim().parse::<i64>().ok());
        Self::new(parse(page), parse(limit))
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Records to skip: `(page - 1) * limit`.
    pub fn skip(&self) -> u64 {
        (self.page as u64).saturating_sub(1) * self.limit as u64
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Listing order over creation time, ties broken by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// A page of results as handed to the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub page: u32,
    pub limit: u32,
    pub next_page: u32,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(pagination: Pagination, data: Vec<T>) -> Self {
        Self {
            page: pagination.page(),
            limit: pagination.limit(),
            next_page: pagination.page().saturating_add(1),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_defaults() {
        let p = Pagination::default();
        assert_eq!((p.page(), p.limit(), p.skip()), (1, 10, 0));
    }

    #[test]
    fn test_out_of_range_limit_falls_back() {
        assert_eq!(Pagination::new(None, Some(200)).limit(), 10);
        assert_eq!(Pagination::new(None, Some(0)).limit(), 10);
        assert_eq!(Pagination::new(None, Some(-5)).limit(), 10);
        assert_eq!(Pagination::new(None, Some(100)).limit(), 100);
        assert_eq!(Pagination::new(None, Some(1)).limit(), 1);
    }

    #[test]
    fn test_deserialize_applies_bounds() {
        let p: Pagination = serde_json::from_str(r#"{"page":0,"limit":500}"#).unwrap();
        assert_eq!((p.page(), p.limit(), p.skip()), (1, 10, 0));

        let p: Pagination = serde_json::from_str(r#"{"page":3,"limit":20}"#).unwrap();
        assert_eq!((p.page(), p.limit(), p.skip()), (3, 20, 40));

        let p: Pagination = serde_json::from_str("{}").unwrap();
        assert_eq!(p, Pagination::default());

        let p: Pagination = serde_json::from_str(r#"{"page":-4,"limit":null}"#).unwrap();
        assert_eq!(p, Pagination::default());
    }

    #[test]
    fn test_page_zero_is_first_page() {
        let p = Pagination::new(Some(0), Some(25));
        assert_eq!(p.page(), 1);
        assert_eq!(p.skip(), 0);
    }

    #[test]
    fn test_skip() {
        assert_eq!(Pagination::new(Some(3), Some(20)).skip(), 40);
    }

    #[test]
    fn test_from_query() {
        let p = Pagination::from_query(Some("2"), Some("abc"));
        assert_eq!((p.page(), p.limit()), (2, 10));
        let p = Pagination::from_query(None, Some(" 50 "));
        assert_eq!((p.page(), p.limit()), (1, 50));
    }

    #[test]
    fn test_page_envelope() {
        let page = Page::new(Pagination::new(Some(4), Some(5)), vec!["a", "b"]);
        assert_eq!(page.page, 4);
        assert_eq!(page.next_page, 5);
        assert_eq!(page.limit, 5);
        assert_eq!(page.data.len(), 2);
    }

    proptest! {
        #[test]
        fn resolved_values_are_always_in_bounds(page in any::<i64>(), limit in any::<i64>()) {
            let p = Pagination::new(Some(page), Some(limit));
            prop_assert!(p.page() >= 1);
            prop_assert!((1..=MAX_LIMIT).contains(&p.limit()));
            prop_assert_eq!(p.skip(), (p.page() as u64 - 1) * p.limit() as u64);
        }
    }
}
