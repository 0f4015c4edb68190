//! Try-and-log combinator for auxiliary fetches.

use std::fmt::Display;
use std::future::Future;
use tracing::warn;

/// Await `fut`; on failure log `what` with the error and return `None`.
///
/// Never propagates. Used for anything whose absence must not stop a task.
pub async fn best_effort<T, E, F>(what: &str, fut: F) -> Option<T>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "Skipping {what}");
            None
        }
    }
}
