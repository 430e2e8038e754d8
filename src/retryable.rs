//! A scoped context that runs a read-style operation with the driver's single-retry policy.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
#[cfg(feature = "tracing-unstable")]
use tracing::{debug, trace};

use crate::{
    binding::Binding,
    channel::Channel,
    error::{Error, Result},
    selection_criteria::ReadPreference,
    BoxFuture,
};

/// A scoped resource acquired around a read-style operation (`find`, `getMore`, `aggregate`,
/// `count`). On construction it selects a server and acquires a [`Channel`]; on completion
/// (success or failure) it releases that channel, regardless of which path out of the operation
/// was taken.
pub struct RetryableRead<'a> {
    binding: &'a dyn Binding,
    retry_requested: bool,
    read_preference: Option<&'a ReadPreference>,
}

impl<'a> RetryableRead<'a> {
    /// Construct a new retryable-read context around `binding`. `retry_requested` mirrors the
    /// caller's `retryReads` configuration; it is honored only if the selected server supports
    /// retryable reads.
    pub fn new(
        binding: &'a dyn Binding,
        retry_requested: bool,
        read_preference: Option<&'a ReadPreference>,
    ) -> Self {
        Self {
            binding,
            retry_requested,
            read_preference,
        }
    }

    /// Select a server, acquire a channel, and run `op` against it. If `op` fails with a
    /// retryable network or server error, and retries were requested, and the selected server
    /// supports retryable reads, re-select (possibly landing on a different server) and run
    /// `op` exactly once more. The channel acquired for the attempt that's actually used is
    /// passed to the continuation `op` for the duration of that single call; it is dropped
    /// (released) as soon as `op`'s future resolves.
    pub async fn run<T, F>(&self, cancellation: &CancellationToken, op: F) -> Result<T>
    where
        F: for<'c> Fn(Arc<dyn Channel>, &'c CancellationToken) -> BoxFuture<'c, Result<T>>,
    {
        let channel = self
            .binding
            .select_server(self.read_preference, cancellation)
            .await?;
        let can_retry = self.retry_requested && self.binding.session().supports_retryable_reads();

        match op(channel.clone(), cancellation).await {
            Ok(value) => Ok(value),
            Err(err) if can_retry && err.is_read_retryable() => {
                #[cfg(feature = "tracing-unstable")]
                debug!(
                    server = %channel.address(),
                    error = %err,
                    "retrying read after retryable error"
                );
                let channel = self
                    .binding
                    .select_server(self.read_preference, cancellation)
                    .await?;
                #[cfg(feature = "tracing-unstable")]
                trace!(server = %channel.address(), "retry attempt selected server");
                op(channel, cancellation).await
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mock::{MockBinding, MockChannel};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_succeeds() {
        let binding = MockBinding::new(vec![MockChannel::new("a")]);
        let retryable = RetryableRead::new(&binding, true, None);
        let attempts = AtomicUsize::new(0);

        let result = retryable
            .run(&CancellationToken::new(), |_channel, _cancel| {
                attempts.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Ok::<_, Error>(42) })
            })
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_once_on_retryable_network_error() {
        let binding = MockBinding::new(vec![MockChannel::new("a"), MockChannel::new("b")]);
        let retryable = RetryableRead::new(&binding, true, None);
        let attempts = AtomicUsize::new(0);

        let result = retryable
            .run(&CancellationToken::new(), |_channel, _cancel| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                Box::pin(async move {
                    if n == 0 {
                        Err(std::io::Error::from(std::io::ErrorKind::ConnectionReset).into())
                    } else {
                        Ok(42)
                    }
                })
            })
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_when_retry_not_requested() {
        let binding = MockBinding::new(vec![MockChannel::new("a"), MockChannel::new("b")]);
        let retryable = RetryableRead::new(&binding, false, None);
        let attempts = AtomicUsize::new(0);

        let result = retryable
            .run(&CancellationToken::new(), |_channel, _cancel| {
                attempts.fetch_add(1, Ordering::SeqCst);
                Box::pin(async {
                    Err::<i32, _>(std::io::Error::from(std::io::ErrorKind::ConnectionReset).into())
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn does_not_retry_non_retryable_error() {
        let binding = MockBinding::new(vec![MockChannel::new("a"), MockChannel::new("b")]);
        let retryable = RetryableRead::new(&binding, true, None);
        let attempts = AtomicUsize::new(0);

        let result = retryable
            .run(&CancellationToken::new(), |_channel, _cancel| {
                attempts.fetch_add(1, Ordering::SeqCst);
                Box::pin(async {
                    Err::<i32, _>(crate::error::Error::invalid_argument("bad filter"))
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
