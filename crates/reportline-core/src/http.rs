//! Shared HTTP plumbing.
//!
//! Uses async reqwest internally but presents a blocking interface: report
//! sources call [`block_on`] on the shared runtime, one request at a time.

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use crate::source::SourceError;

/// Default connect timeout
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default whole-request timeout (report pages can take a while to build)
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeouts for the report source client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Run a future to completion on the shared runtime.
pub fn block_on<F: Future>(future: F) -> F::Output {
    SHARED_RUNTIME.handle().block_on(future)
}

/// Build an HTTP client with the configured timeouts.
pub fn build_client(config: &HttpConfig) -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .user_agent(concat!("reportline/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(SourceError::from_reqwest)
}
