//! Scripted in-memory report source for tests

use std::collections::VecDeque;

use std::sync::atomic::Ordering;

use crate::page::Response;
use crate::shutdown::shutdown_flag;
use crate::source::{PageRequest, ReportSource, SourceError};
use crate::window::DateWindow;

/// One recorded source call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub window: DateWindow,
    /// Cursor sent for each requested report
    pub cursors: Vec<Option<String>>,
    /// Dimension list of each requested report
    pub dimensions: Vec<Vec<String>>,
}

type Hook = Box<dyn FnOnce()>;

/// Replays queued responses in order and records every call.
#[derive(Default)]
pub struct ScriptedSource {
    script: VecDeque<(Result<Response, SourceError>, Option<Hook>)>,
    calls: Vec<RecordedCall>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, response: Response) -> Self {
        self.script.push_back((Ok(response), None));
        self
    }

    /// Queue a response and run `hook` at the moment it is served.
    pub fn respond_then(mut self, response: Response, hook: impl FnOnce() + 'static) -> Self {
        self.script.push_back((Ok(response), Some(Box::new(hook))));
        self
    }

    pub fn fail(mut self, error: SourceError) -> Self {
        self.script.push_back((Err(error), None));
        self
    }

    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }

    /// Queued responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl ReportSource for ScriptedSource {
    fn fetch(
        &mut self,
        window: &DateWindow,
        requests: &[PageRequest<'_>],
    ) -> Result<Response, SourceError> {
        self.calls.push(RecordedCall {
            window: *window,
            cursors: requests
                .iter()
                .map(|r| r.cursor.map(String::from))
                .collect(),
            dimensions: requests
                .iter()
                .map(|r| r.query.dimensions.clone())
                .collect(),
        });
        match self.script.pop_front() {
            Some((result, hook)) => {
                if let Some(hook) = hook {
                    hook();
                }
                result
            }
            None => Err(SourceError::Protocol("script exhausted".into())),
        }
    }
}

/// Lower the process-wide shutdown flag raised by a previous test.
pub fn clear_shutdown_request() {
    shutdown_flag().store(false, Ordering::Relaxed);
}
