//! Page-number pagination envelope.
//!
//! Listings render as `{"count", "next", "previous", "results"}` with
//! page-number URLs. Page size defaults from config and is client-overridable
//! up to the configured maximum; a page past the end is a 404, not an empty
//! list.

use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};

use crate::config::PaginationConfig;
use crate::rest::error::ApiError;

const INVALID_PAGE: &str = "Invalid page.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: i64,
    pub page_size: i64,
}

impl PageParams {
    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

/// Parse `page` / `page_size` out of the query string. A `page` that is not a
/// positive integer is rejected outright; a malformed `page_size` silently
/// falls back to the default.
pub fn page_params(
    query: &HashMap<String, String>,
    cfg: &PaginationConfig,
) -> Result<PageParams, ApiError> {
    let page = match query.get("page") {
        None => 1,
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|page| *page >= 1)
            .ok_or_else(|| ApiError::not_found(INVALID_PAGE))?,
    };
    let page_size = query
        .get("page_size")
        .and_then(|raw| raw.parse::<i64>().ok())
        .filter(|size| *size >= 1)
        .unwrap_or(i64::from(cfg.page_size))
        .min(i64::from(cfg.max_page_size));
    Ok(PageParams { page, page_size })
}

/// Wrap one page of results. `query` is the request's full parameter set, so
/// next/previous links preserve active filters.
pub fn envelope(
    path: &str,
    query: &HashMap<String, String>,
    page: &PageParams,
    count: i64,
    results: Vec<Value>,
) -> Result<Value, ApiError> {
    let total_pages = if count == 0 {
        1
    } else {
        (count + page.page_size - 1) / page.page_size
    };
    if page.page > total_pages {
        return Err(ApiError::not_found(INVALID_PAGE));
    }

    let next = (page.page < total_pages).then(|| page_url(path, query, page.page + 1));
    let previous = (page.page > 1).then(|| page_url(path, query, page.page - 1));
    Ok(json!({
        "count": count,
        "next": next,
        "previous": previous,
        "results": results,
    }))
}

fn page_url(path: &str, query: &HashMap<String, String>, page: i64) -> String {
    let mut params: BTreeMap<&str, String> = query
        .iter()
        .filter(|(key, _)| key.as_str() != "page")
        .map(|(key, value)| (key.as_str(), value.clone()))
        .collect();
    if page > 1 {
        params.insert("page", page.to_string());
    }
    if params.is_empty() {
        path.to_string()
    } else {
        let qs = params
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{path}?{qs}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> PaginationConfig {
        PaginationConfig {
            page_size: 10,
            max_page_size: 100,
        }
    }

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply() {
        let params = page_params(&query(&[]), &cfg()).unwrap();
        assert_eq!(params, PageParams { page: 1, page_size: 10 });
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn page_size_clamped_to_max() {
        let params = page_params(&query(&[("page_size", "500")]), &cfg()).unwrap();
        assert_eq!(params.page_size, 100);
    }

    #[test]
    fn malformed_page_size_ignored() {
        let params = page_params(&query(&[("page_size", "lots")]), &cfg()).unwrap();
        assert_eq!(params.page_size, 10);
    }

    #[test]
    fn bad_page_is_not_found() {
        for raw in ["0", "-1", "two"] {
            let err = page_params(&query(&[("page", raw)]), &cfg()).unwrap_err();
            assert!(matches!(err, ApiError::NotFound(_)), "page={raw}");
        }
    }

    #[test]
    fn page_past_end_is_not_found() {
        let params = PageParams { page: 3, page_size: 10 };
        let err = envelope("/api/tasks", &query(&[]), &params, 15, vec![]).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn first_page_of_empty_set_is_ok() {
        let params = PageParams { page: 1, page_size: 10 };
        let body = envelope("/api/tasks", &query(&[]), &params, 0, vec![]).unwrap();
        assert_eq!(body["count"], 0);
        assert_eq!(body["next"], Value::Null);
        assert_eq!(body["previous"], Value::Null);
    }

    #[test]
    fn links_preserve_filters() {
        let q = query(&[("status", "pending"), ("page", "2"), ("page_size", "5")]);
        let params = PageParams { page: 2, page_size: 5 };
        let body = envelope("/api/tasks", &q, &params, 12, vec![]).unwrap();
        assert_eq!(
            body["next"],
            json!("/api/tasks?page=3&page_size=5&status=pending")
        );
        // Page 1 link omits the page parameter.
        assert_eq!(
            body["previous"],
            json!("/api/tasks?page_size=5&status=pending")
        );
    }
}
