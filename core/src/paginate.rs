//! Aggregation of multi-page collection responses.
//!
//! # Design
//! The backend splits collections into pages of at most `PER_PAGE` records
//! and advertises the page count in a `Pages` response header. `Paginator`
//! hides that split: one call returns the whole collection, in the order the
//! backend emitted it, or fails as a whole. Pages are requested strictly one
//! after another; nothing is cached between calls.

use std::str::FromStr;

use log::debug;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::http::HttpRequest;
use crate::transport::Transport;

/// Records requested per page.
pub const PER_PAGE: u32 = 300;

/// Response header carrying the total page count.
pub const PAGES_HEADER: &str = "Pages";

/// How the paginator decides that the last page has been seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PagePolicy {
    /// Trust the first page's `Pages` header. A missing or unparsable header
    /// means the first page is the whole collection.
    #[default]
    PageCountHeader,
    /// Keep requesting pages until one comes back empty. A `Pages` header, if
    /// present, still caps the walk.
    UntilEmpty,
}

impl FromStr for PagePolicy {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "header" | "page-count-header" => Ok(PagePolicy::PageCountHeader),
            "until-empty" | "empty" => Ok(PagePolicy::UntilEmpty),
            other => Err(ApiError::Config(format!("unknown page policy '{other}'"))),
        }
    }
}

struct Page<R> {
    records: Vec<R>,
    pages: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Paginator {
    policy: PagePolicy,
}

impl Paginator {
    pub fn new(policy: PagePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> PagePolicy {
        self.policy
    }

    /// Fetch every page of the collection behind `request`.
    ///
    /// `request` must be a GET carrying any filters the caller needs; the
    /// paginator adds `page` and `per_page` to each copy it sends.
    pub fn fetch_all<R, T>(&self, transport: &T, request: &HttpRequest) -> Result<Vec<R>, ApiError>
    where
        R: DeserializeOwned,
        T: Transport + ?Sized,
    {
        let first = fetch_page::<R, T>(transport, request, 1)?;
        let mut records = first.records;

        match self.policy {
            PagePolicy::PageCountHeader => {
                let pages = first.pages.unwrap_or(1);
                for page in 2..=pages {
                    records.extend(fetch_page::<R, T>(transport, request, page)?.records);
                }
            }
            PagePolicy::UntilEmpty => {
                let mut limit = first.pages;
                let mut page = 1;
                let mut exhausted = records.is_empty();
                while !exhausted && !limit.is_some_and(|pages| page >= pages) {
                    page += 1;
                    let next = fetch_page::<R, T>(transport, request, page)?;
                    limit = next.pages.or(limit);
                    exhausted = next.records.is_empty();
                    records.extend(next.records);
                }
            }
        }

        debug!("Fetched {} records from {}", records.len(), request.path);
        Ok(records)
    }
}

fn fetch_page<R, T>(transport: &T, request: &HttpRequest, page: u32) -> Result<Page<R>, ApiError>
where
    R: DeserializeOwned,
    T: Transport + ?Sized,
{
    let paged = request
        .with_query("page", page)
        .with_query("per_page", PER_PAGE);
    let response = transport.execute(&paged)?;

    if !response.is_success() {
        let (status, body) = (response.status, response.body);
        return Err(if page == 1 {
            ApiError::Authentication { status, body }
        } else {
            ApiError::PageFailed { page, status, body }
        });
    }

    let pages = response
        .header(PAGES_HEADER)
        .and_then(|value| value.trim().parse::<u32>().ok());
    let records: Vec<R> = serde_json::from_str(&response.body)
        .map_err(|e| ApiError::Deserialization(format!("page {page} of {}: {e}", request.path)))?;
    debug!(
        "Page {page} of {} (pages header: {pages:?}): {} records",
        request.path,
        records.len()
    );

    Ok(Page { records, pages })
}
