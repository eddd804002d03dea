//! Report source boundary
//!
//! The source is an opaque paginated service. Calls are synchronous and
//! blocking; an HTTP implementation drives its async client on
//! [`SHARED_RUNTIME`](crate::http::SHARED_RUNTIME).

use crate::page::Response;
use crate::query::QueryDefinition;
use crate::window::DateWindow;

/// One report to request in a source call.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    pub query: &'a QueryDefinition,
    /// `None` requests the first page.
    pub cursor: Option<&'a str>,
}

/// Paginated report service.
pub trait ReportSource {
    /// Fetch one page for each request, over `window`.
    ///
    /// The response must contain exactly one report per request, in order.
    fn fetch(
        &mut self,
        window: &DateWindow,
        requests: &[PageRequest<'_>],
    ) -> Result<Response, SourceError>;
}

impl<S: ReportSource + ?Sized> ReportSource for &mut S {
    fn fetch(
        &mut self,
        window: &DateWindow,
        requests: &[PageRequest<'_>],
    ) -> Result<Response, SourceError> {
        (**self).fetch(window, requests)
    }
}

impl<S: ReportSource + ?Sized> ReportSource for Box<S> {
    fn fetch(
        &mut self,
        window: &DateWindow,
        requests: &[PageRequest<'_>],
    ) -> Result<Response, SourceError> {
        (**self).fetch(window, requests)
    }
}

/// Errors from a report source. None are retried by the pipeline.
#[derive(Debug)]
pub enum SourceError {
    /// Transport failure or non-success HTTP status
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Response body is not a valid report response
    Decode(String),
    /// Response does not match the request (report count, repeated cursor)
    Protocol(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Decode(msg) => write!(f, "invalid response: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}

impl SourceError {
    /// Create HTTP error from reqwest error, without the request URL.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.without_url().to_string(),
        }
    }

    /// 401/403: credentials rejected.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::Http {
                status: Some(401 | 403),
                ..
            }
        )
    }

    /// 429: quota or rate limit exhausted.
    pub fn is_quota(&self) -> bool {
        matches!(
            self,
            Self::Http {
                status: Some(429),
                ..
            }
        )
    }
}
