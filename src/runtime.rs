//! A thin wrapper around the `tokio` primitives this crate needs: spawning a best-effort
//! background task (the `killCursors` fallback issued when a cursor is dropped without an
//! explicit `close`) and bounding a future with a deadline independent of the caller's
//! cancellation token.

use std::{future::Future, time::Duration};

use crate::error::Result;

/// Spawn a task in the background to run a future, detached from the caller.
///
/// Must be called from within a task already running on a `tokio` runtime.
pub(crate) fn spawn<F>(fut: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(fut);
}

/// Await a future for at most `timeout`, mapping an expiry to a network-timeout [`Error`](crate::error::Error).
pub(crate) async fn timeout<F: Future>(timeout: Duration, future: F) -> Result<F::Output> {
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| crate::error::Error::network_timeout())
}
