//! Page-number pagination with absolute `next`/`previous` links, plus the
//! query-string access used by list filters.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use serde::Serialize;
use url::Url;

use crate::{error::ApiError, state::AppState};

pub const MAX_PAGE_SIZE: i64 = 100;

fn invalid_page() -> ApiError {
    ApiError::not_found("Invalid page.")
}

/// Decoded query pairs of a list request together with its absolute URL.
/// Repeated keys are preserved (`?tags=a&tags=b`).
#[derive(Debug, Clone)]
pub struct ListQuery {
    url: Url,
    pairs: Vec<(String, String)>,
}

#[async_trait]
impl FromRequestParts<AppState> for ListQuery {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // OriginalUri keeps the `/api` prefix stripped by nested routers.
        let uri = parts
            .extensions
            .get::<axum::extract::OriginalUri>()
            .map(|o| o.0.clone())
            .unwrap_or_else(|| parts.uri.clone());
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        ListQuery::parse(&state.config.public_url, path_and_query)
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
    }
}

impl ListQuery {
    pub fn parse(public_url: &str, path_and_query: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(&format!("{public_url}{path_and_query}"))?;
        let pairs = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Ok(Self { url, pairs })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.pairs
            .iter()
            .filter(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    /// `1`/`true` enable a boolean filter; anything else leaves it off.
    pub fn get_flag(&self, key: &str) -> bool {
        matches!(
            self.get(key).map(|v| v.trim().to_ascii_lowercase()).as_deref(),
            Some("1") | Some("true")
        )
    }

    /// Positive integer or `None`; garbage is ignored rather than rejected.
    pub fn positive(&self, key: &str) -> Option<i64> {
        self.get_i64(key).filter(|v| *v > 0)
    }

    /// `limit` is clamped to [`MAX_PAGE_SIZE`]. A page whose offset does not
    /// fit in `i64` is rejected before any query runs.
    pub fn window(&self, default_size: i64) -> Result<PageWindow, ApiError> {
        let size = self
            .positive("limit")
            .unwrap_or(default_size)
            .min(MAX_PAGE_SIZE);
        let page = match self.get("page") {
            None => 1,
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|p| *p > 0)
                .ok_or_else(invalid_page)?,
        };
        let window = PageWindow { page, size };
        window.checked_offset().ok_or_else(invalid_page)?;
        Ok(window)
    }

    fn link_for(&self, page: i64) -> String {
        let mut url = self.url.clone();
        let kept: Vec<(String, String)> = self
            .pairs
            .iter()
            .filter(|(k, _)| k != "page")
            .cloned()
            .collect();
        {
            let mut q = url.query_pairs_mut();
            q.clear();
            for (k, v) in &kept {
                q.append_pair(k, v);
            }
            if page > 1 {
                q.append_pair("page", &page.to_string());
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        url.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: i64,
    pub size: i64,
}

impl PageWindow {
    fn checked_offset(&self) -> Option<i64> {
        (self.page - 1).checked_mul(self.size)
    }

    /// Windows built by [`ListQuery::window`] never saturate.
    pub fn offset(&self) -> i64 {
        self.checked_offset().unwrap_or(i64::MAX)
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Wrap one page of results. A page past the end is an error unless it
    /// is the first page of an empty collection.
    pub fn build(
        query: &ListQuery,
        window: PageWindow,
        count: i64,
        results: Vec<T>,
    ) -> Result<Self, ApiError> {
        let last_page = if count <= 0 {
            1
        } else {
            (count - 1) / window.size + 1
        };
        if window.page > last_page {
            return Err(ApiError::not_found("Invalid page."));
        }
        let next = (window.page < last_page).then(|| query.link_for(window.page + 1));
        let previous = (window.page > 1).then(|| query.link_for(window.page - 1));
        Ok(Self {
            count,
            next,
            previous,
            results,
        })
    }
}
