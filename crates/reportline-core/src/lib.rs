//! Reportline Core - paginated report fetching and persistence
//!
//! Date windows, the cursor-paginated fetch loop, output sinks, and the
//! shared logging/progress/HTTP infrastructure used by every report job.

pub mod error;
pub mod fetch;
pub mod http;
pub mod logging;
pub mod page;
pub mod progress;
pub mod query;
pub mod shutdown;
pub mod sink;
pub mod source;
pub mod window;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-exports for convenience
pub use error::{FetchError, SinkError};
pub use fetch::{Cursor, FetchOutcome, FetchedPage, Flow, fetch_window};
pub use http::{HttpConfig, SHARED_RUNTIME, block_on, build_client};
pub use logging::{IndicatifLogger, init_logging};
pub use page::{Page, Response};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use query::{DimensionFilter, FilterOperator, QueryDefinition};
pub use shutdown::{install_signal_handlers, is_shutdown_requested, request_shutdown};
pub use sink::{CsvSink, JsonSink, PageSink, SinkSet, TableSink, cleanup_tmp_files, read_pages};
pub use source::{PageRequest, ReportSource, SourceError};
pub use window::{DateWindow, DateWindows};
