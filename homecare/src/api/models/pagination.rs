//! Offset pagination shared by list endpoints (`?skip=&limit=`).

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// Query string values arrive as strings, hence `DisplayFromStr`.
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// Number of items to skip (default: 0)
    #[param(default = 0, minimum = 0)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub skip: Option<i64>,

    /// Maximum number of items to return (default: 10, max: 100)
    #[param(default = 10, minimum = 1, maximum = 100)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub limit: Option<i64>,
}

impl Pagination {
    #[inline]
    pub fn skip(&self) -> i64 {
        self.skip.unwrap_or(0).max(0)
    }

    /// Always within `1..=MAX_LIMIT`.
    #[inline]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// A page of results plus the total row count before pagination.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T: ToSchema> {
    pub data: Vec<T>,
    pub total_count: i64,
    pub skip: i64,
    pub limit: i64,
}

impl<T: ToSchema> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total_count: i64, skip: i64, limit: i64) -> Self {
        Self {
            data,
            total_count,
            skip,
            limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_absent() {
        let p = Pagination::default();
        assert_eq!(p.skip(), 0);
        assert_eq!(p.limit(), DEFAULT_LIMIT);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let p = Pagination {
            skip: Some(-3),
            limit: Some(0),
        };
        assert_eq!(p.skip(), 0);
        assert_eq!(p.limit(), 1);

        let p = Pagination {
            skip: Some(40),
            limit: Some(5_000),
        };
        assert_eq!(p.skip(), 40);
        assert_eq!(p.limit(), MAX_LIMIT);
    }

    #[test]
    fn query_strings_deserialize_numbers() {
        let p: Pagination = serde_json::from_value(serde_json::json!({ "skip": "20", "limit": "25" })).unwrap();
        assert_eq!(p.skip(), 20);
        assert_eq!(p.limit(), 25);
    }
}
