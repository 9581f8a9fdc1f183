//! Cursor pagination driven by `Link` response headers.
//!
//! # Design
//! The provider answers a listing request with a `self` link and, when more
//! results exist, a second `next` link. Only the exact-two case counts as a
//! next page. The absolute link is resolved against the API base with the
//! `url` crate and carried forward as a `PageCursor` (an endpoint relative
//! to that base), so the client never rewrites URL strings by hand.
//!
//! `Paginator` is the follower's state machine. It performs no I/O: the
//! caller asks it which endpoint to fetch, executes the request, and feeds
//! the parsed page back with `advance`.

use tracing::debug;
use url::Url;

use crate::error::ApiError;
use crate::http::HttpResponse;

/// One page of a listing plus the cursor for the page after it.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<PageCursor>,
}

/// Position of a page, expressed as an endpoint relative to the API base
/// (e.g. `users/00u1/groups?after=00g9&limit=200`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    endpoint: String,
}

impl PageCursor {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// The raw next-page link: the second `Link` header when exactly two are
/// present.
pub fn next_link(response: &HttpResponse) -> Option<&str> {
    match response.header_values("link").as_slice() {
        [_, next] => Some(*next),
        _ => None,
    }
}

/// Turn a `Link` header value such as `<https://acme.okta.com/api/v1/users?after=x>; rel="next"`
/// into a cursor relative to `api_base`. An empty link means there is no
/// next page.
pub fn resolve_link(api_base: &str, link: &str) -> Result<Option<PageCursor>, ApiError> {
    let target = link.split(';').next().unwrap_or_default().trim();
    let target = target.trim_start_matches('<').trim_end_matches('>').trim();
    if target.is_empty() {
        return Ok(None);
    }

    let base = Url::parse(api_base).map_err(|e| ApiError::InvalidLink(format!("{api_base}: {e}")))?;
    let resolved = base
        .join(target)
        .map_err(|e| ApiError::InvalidLink(format!("{target}: {e}")))?;

    match resolved.as_str().strip_prefix(base.as_str()) {
        Some(endpoint) if !endpoint.is_empty() => Ok(Some(PageCursor::new(endpoint))),
        _ => Err(ApiError::InvalidLink(resolved.to_string())),
    }
}

/// Where a pagination walk currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageState {
    /// `endpoint` is the next request to issue.
    Fetching { endpoint: String },
    /// The last page pointed at another one.
    HasNext(PageCursor),
    Done,
    Errored,
}

/// Accumulates items across pages in the order they were visited.
#[derive(Debug)]
pub struct Paginator<T> {
    state: PageState,
    items: Vec<T>,
    pages: usize,
}

impl<T> Paginator<T> {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            state: PageState::Fetching {
                endpoint: endpoint.into(),
            },
            items: Vec::new(),
            pages: 0,
        }
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    /// Number of pages successfully absorbed so far.
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Endpoint to fetch next, or `None` once the walk has ended. Moves
    /// `HasNext` to `Fetching`.
    pub fn next_endpoint(&mut self) -> Option<String> {
        if let PageState::HasNext(cursor) = &self.state {
            self.state = PageState::Fetching {
                endpoint: cursor.endpoint().to_string(),
            };
        }
        match &self.state {
            PageState::Fetching { endpoint } => Some(endpoint.clone()),
            _ => None,
        }
    }

    /// Feed the outcome of the outstanding fetch.
    ///
    /// An error is terminal: it is handed back and the items gathered from
    /// earlier pages are dropped, so the caller only ever observes the
    /// failing page.
    pub fn advance(&mut self, result: Result<Page<T>, ApiError>) -> Result<(), ApiError> {
        let page = match result {
            Ok(page) => page,
            Err(err) => {
                debug!(pages = self.pages, error = %err, "pagination aborted");
                self.state = PageState::Errored;
                self.items.clear();
                return Err(err);
            }
        };

        self.pages += 1;
        self.items.extend(page.items);
        self.state = match page.next {
            Some(cursor) => {
                debug!(page = self.pages, next = cursor.endpoint(), "following next link");
                PageState::HasNext(cursor)
            }
            None => PageState::Done,
        };
        Ok(())
    }

    /// Everything gathered so far.
    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}
