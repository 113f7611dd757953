//! Single-retry helper for remote connector calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use smartrecover_core::{Error, Result};

/// Initial backoff before the retry attempt.
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Run `op`, retrying once after a short backoff when the failure is
/// transient (timeouts, 5xx). Non-transient errors propagate immediately.
pub(crate) async fn with_retry<T, F, Fut>(operation: &str, op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(e) if e.is_transient() => {
            warn!(operation, error = %e, "Transient failure, retrying once");
            tokio::time::sleep(INITIAL_BACKOFF).await;
            op().await
        }
        Err(e) => Err(e),
    }
}

/// Convert a reqwest failure into the error taxonomy. Timeouts and
/// connection problems are transient upstream failures.
pub(crate) fn upstream_error(operation: &str, e: reqwest::Error) -> Error {
    Error::upstream(format!("{operation} failed: {e}"))
}

/// Map a non-success HTTP status onto the taxonomy: 404 is not-found, other
/// 4xx are invalid input, 5xx are transient upstream failures.
pub(crate) fn status_error(operation: &str, status: reqwest::StatusCode) -> Error {
    if status == reqwest::StatusCode::NOT_FOUND {
        Error::not_found(format!("{operation}: remote returned 404"))
    } else if status.is_client_error() {
        Error::invalid_input(format!("{operation}: remote returned {status}"))
    } else {
        Error::upstream(format!("{operation}: remote returned {status}"))
    }
}
