//! Paginated fetch loop for one date window
//!
//! ```text
//! START → FETCHING → WRITE_PAGE → [cursor] FETCHING → [no cursor] DONE
//!                 ↘ source error → ABORTED
//! ```
//!
//! Every report of a batch pages independently: a report whose cursor is
//! exhausted is dropped from later requests while the others keep paging.
//! Each response is handed to the page callback before the next request.

use serde::{Deserialize, Serialize};

use crate::error::{FetchError, SinkError};
use crate::page::Response;
use crate::query::QueryDefinition;
use crate::source::{PageRequest, ReportSource, SourceError};
use crate::window::DateWindow;

/// Continuation state of one report within a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "token", rename_all = "snake_case")]
pub enum Cursor {
    /// Nothing fetched yet
    Start,
    /// More pages remain after this token
    Next(String),
    /// Last page already fetched
    Done,
}

impl Cursor {
    /// Fresh cursors for a batch of `n` reports.
    pub fn initial(n: usize) -> Vec<Cursor> {
        vec![Cursor::Start; n]
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Next(token) => Some(token),
            Self::Start | Self::Done => None,
        }
    }
}

/// Returned by the page callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Stop after this page; the window stays resumable from its cursors.
    Stop,
}

/// A fetched page as handed to the page callback.
#[derive(Debug)]
pub struct FetchedPage<'a> {
    /// 1-based page number within this fetch call
    pub number: usize,
    pub response: &'a Response,
    /// Cursor state after this page, one per report of the batch
    pub cursors: &'a [Cursor],
}

/// Result of fetching one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub pages: usize,
    pub rows: usize,
    pub cursors: Vec<Cursor>,
    /// Every report reached its last page
    pub completed: bool,
}

/// Page through `queries` over `window`, starting from `cursors`.
///
/// `cursors` must hold one entry per query (use [`Cursor::initial`] for a
/// fresh window). Source errors are not retried.
pub fn fetch_window<S, F>(
    source: &mut S,
    queries: &[QueryDefinition],
    window: &DateWindow,
    mut cursors: Vec<Cursor>,
    mut on_page: F,
) -> Result<FetchOutcome, FetchError>
where
    S: ReportSource + ?Sized,
    F: FnMut(FetchedPage<'_>) -> Result<Flow, SinkError>,
{
    if cursors.len() != queries.len() {
        log::warn!(
            "{window}: {} cursors for {} reports, starting over",
            cursors.len(),
            queries.len()
        );
        cursors = Cursor::initial(queries.len());
    }

    let mut pages = 0;
    let mut rows = 0;

    loop {
        let active: Vec<usize> = (0..queries.len())
            .filter(|&i| !cursors[i].is_done())
            .collect();
        if active.is_empty() {
            break;
        }

        let sent: Vec<Option<String>> = active
            .iter()
            .map(|&i| cursors[i].token().map(String::from))
            .collect();
        let requests: Vec<PageRequest<'_>> = active
            .iter()
            .zip(&sent)
            .map(|(&i, cursor)| PageRequest {
                query: &queries[i],
                cursor: cursor.as_deref(),
            })
            .collect();

        log::debug!(
            "{window}: requesting {} report(s), cursors {:?}",
            requests.len(),
            sent
        );
        let response = source.fetch(window, &requests)?;
        drop(requests);

        if response.reports.len() != active.len() {
            return Err(SourceError::Protocol(format!(
                "requested {} reports, received {}",
                active.len(),
                response.reports.len()
            ))
            .into());
        }

        for ((&i, page), previous) in active.iter().zip(&response.reports).zip(&sent) {
            cursors[i] = match page.cursor() {
                Some(token) if previous.as_deref() == Some(token) => {
                    return Err(SourceError::Protocol(format!(
                        "report {i} returned its request cursor {token:?} again"
                    ))
                    .into());
                }
                Some(token) => Cursor::Next(token.to_string()),
                None => Cursor::Done,
            };
        }

        pages += 1;
        rows += response.row_count();

        let flow = on_page(FetchedPage {
            number: pages,
            response: &response,
            cursors: &cursors,
        })?;
        if flow == Flow::Stop {
            break;
        }
    }

    let completed = cursors.iter().all(Cursor::is_done);
    Ok(FetchOutcome {
        pages,
        rows,
        cursors,
        completed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::page_from_parts;
    use crate::testing::ScriptedSource;
    use chrono::NaiveDate;

    fn window() -> DateWindow {
        let d = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        DateWindow::new(d, d)
    }

    fn pages_query() -> QueryDefinition {
        QueryDefinition::new("1")
            .metric("ga:pageviews")
            .dimension("ga:pagePath")
    }

    fn events_query() -> QueryDefinition {
        QueryDefinition::new("1")
            .metric("ga:totalEvents")
            .dimension("ga:pagePath")
            .dimension("ga:eventCategory")
    }

    fn single(cursor: Option<&str>, path: &str) -> Response {
        Response::new(vec![page_from_parts(
            &["ga:pagePath"],
            &["ga:pageviews"],
            &[&[path, "1"]],
            cursor,
        )])
    }

    #[test]
    fn three_pages_three_requests_in_order() {
        let mut source = ScriptedSource::new()
            .respond(single(Some("a"), "/1"))
            .respond(single(Some("b"), "/2"))
            .respond(single(None, "/3"));
        let queries = [pages_query()];

        let mut written = Vec::new();
        let outcome = fetch_window(
            &mut source,
            &queries,
            &window(),
            Cursor::initial(1),
            |page| {
                written.push(page.response.reports[0].data.rows[0].dimensions[0].clone());
                Ok(Flow::Continue)
            },
        )
        .unwrap();

        assert_eq!(written, vec!["/1", "/2", "/3"]);
        assert_eq!(source.calls().len(), 3);
        let sent: Vec<_> = source.calls().iter().map(|c| c.cursors[0].clone()).collect();
        assert_eq!(sent, vec![None, Some("a".into()), Some("b".into())]);
        assert_eq!(outcome.pages, 3);
        assert_eq!(outcome.rows, 3);
        assert!(outcome.completed);
        assert_eq!(source.remaining(), 0);
    }

    #[test]
    fn stops_at_first_page_without_cursor() {
        let mut source = ScriptedSource::new()
            .respond(single(None, "/only"))
            .respond(single(Some("never"), "/unreachable"));
        let outcome = fetch_window(
            &mut source,
            &[pages_query()],
            &window(),
            Cursor::initial(1),
            |_| Ok(Flow::Continue),
        )
        .unwrap();
        assert_eq!(outcome.pages, 1);
        assert_eq!(source.remaining(), 1);
    }

    #[test]
    fn source_error_aborts_window() {
        let mut source = ScriptedSource::new()
            .respond(single(Some("a"), "/1"))
            .fail(SourceError::Http {
                status: Some(429),
                message: "quota".into(),
            });
        let mut pages = 0;
        let err = fetch_window(
            &mut source,
            &[pages_query()],
            &window(),
            Cursor::initial(1),
            |_| {
                pages += 1;
                Ok(Flow::Continue)
            },
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::Source(ref e) if e.is_quota()));
        assert_eq!(pages, 1);
    }

    #[test]
    fn sink_error_aborts_window() {
        let mut source = ScriptedSource::new()
            .respond(single(Some("a"), "/1"))
            .respond(single(None, "/2"));
        let err = fetch_window(
            &mut source,
            &[pages_query()],
            &window(),
            Cursor::initial(1),
            |_| {
                Err(SinkError::io(
                    std::path::Path::new("out.csv"),
                    std::io::Error::other("disk full"),
                ))
            },
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::Sink(_)));
        assert_eq!(source.calls().len(), 1);
    }

    #[test]
    fn resumes_from_stored_cursor() {
        let mut source = ScriptedSource::new().respond(single(None, "/3"));
        let outcome = fetch_window(
            &mut source,
            &[pages_query()],
            &window(),
            vec![Cursor::Next("b".into())],
            |_| Ok(Flow::Continue),
        )
        .unwrap();
        assert_eq!(source.calls()[0].cursors, vec![Some("b".to_string())]);
        assert!(outcome.completed);
    }

    #[test]
    fn done_cursors_issue_no_requests() {
        let mut source = ScriptedSource::new();
        let outcome = fetch_window(
            &mut source,
            &[pages_query()],
            &window(),
            vec![Cursor::Done],
            |_| Ok(Flow::Continue),
        )
        .unwrap();
        assert_eq!(outcome.pages, 0);
        assert!(outcome.completed);
        assert!(source.calls().is_empty());
    }

    #[test]
    fn stop_leaves_window_resumable() {
        let mut source = ScriptedSource::new()
            .respond(single(Some("a"), "/1"))
            .respond(single(None, "/2"));
        let outcome = fetch_window(
            &mut source,
            &[pages_query()],
            &window(),
            Cursor::initial(1),
            |_| Ok(Flow::Stop),
        )
        .unwrap();
        assert!(!outcome.completed);
        assert_eq!(outcome.cursors, vec![Cursor::Next("a".into())]);
        assert_eq!(source.remaining(), 1);
    }

    #[test]
    fn exhausted_report_is_not_requested_again() {
        let events_page = |cursor: Option<&str>| {
            page_from_parts(
                &["ga:pagePath", "ga:eventCategory"],
                &["ga:totalEvents"],
                &[&["/", "video", "1"]],
                cursor,
            )
        };
        let pages_page = |cursor: Option<&str>| {
            page_from_parts(&["ga:pagePath"], &["ga:pageviews"], &[&["/", "1"]], cursor)
        };
        let mut source = ScriptedSource::new()
            .respond(Response::new(vec![pages_page(None), events_page(Some("e1"))]))
            .respond(Response::new(vec![events_page(Some("e2"))]))
            .respond(Response::new(vec![events_page(None)]));

        let queries = [pages_query(), events_query()];
        let mut seen_cursors = Vec::new();
        let outcome = fetch_window(
            &mut source,
            &queries,
            &window(),
            Cursor::initial(2),
            |page| {
                seen_cursors.push(page.cursors.to_vec());
                Ok(Flow::Continue)
            },
        )
        .unwrap();

        let calls = source.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].dimensions.len(), 2);
        assert_eq!(calls[1].dimensions, vec![events_query().dimensions]);
        assert_eq!(calls[1].cursors, vec![Some("e1".to_string())]);
        assert_eq!(calls[2].cursors, vec![Some("e2".to_string())]);
        assert_eq!(
            seen_cursors[0],
            vec![Cursor::Done, Cursor::Next("e1".into())]
        );
        assert_eq!(outcome.pages, 3);
        assert_eq!(outcome.rows, 4);
        assert!(outcome.completed);
    }

    #[test]
    fn report_count_mismatch_is_protocol_error() {
        let mut source = ScriptedSource::new().respond(Response::new(vec![]));
        let err = fetch_window(
            &mut source,
            &[pages_query()],
            &window(),
            Cursor::initial(1),
            |_| Ok(Flow::Continue),
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::Source(SourceError::Protocol(_))));
    }

    #[test]
    fn repeated_cursor_is_protocol_error() {
        let mut source = ScriptedSource::new()
            .respond(single(Some("a"), "/1"))
            .respond(single(Some("a"), "/1"));
        let err = fetch_window(
            &mut source,
            &[pages_query()],
            &window(),
            Cursor::initial(1),
            |_| Ok(Flow::Continue),
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::Source(SourceError::Protocol(_))));
        assert_eq!(source.calls().len(), 2);
    }

    #[test]
    fn mismatched_cursor_count_starts_over() {
        let mut source = ScriptedSource::new().respond(single(None, "/1"));
        fetch_window(
            &mut source,
            &[pages_query()],
            &window(),
            vec![Cursor::Done, Cursor::Done],
            |_| Ok(Flow::Continue),
        )
        .unwrap();
        assert_eq!(source.calls()[0].cursors, vec![None]);
    }

    #[test]
    fn cursor_serde_shape() {
        let json = serde_json::to_string(&Cursor::Next("10000".into())).unwrap();
        assert_eq!(json, r#"{"state":"next","token":"10000"}"#);
        let start: Cursor = serde_json::from_str(r#"{"state":"start"}"#).unwrap();
        assert_eq!(start, Cursor::Start);
    }
}
