use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::{
    change_stream::{event::ResumeToken, ChangeStreamCursor as AsyncChangeStreamCursor},
    error::Result,
};

/// A blocking wrapper around [`ChangeStreamCursor`](crate::change_stream::ChangeStreamCursor),
/// driving the underlying async cursor (and its resumes) to completion on a dedicated background
/// runtime.
pub struct ChangeStreamCursor<T> {
    inner: AsyncChangeStreamCursor<T>,
}

impl<T: DeserializeOwned> ChangeStreamCursor<T> {
    pub(crate) fn new(inner: AsyncChangeStreamCursor<T>) -> Self {
        Self { inner }
    }

    /// Block until the next event is available.
    pub fn next(&mut self) -> Result<T> {
        super::RUNTIME.block_on(self.inner.next(&CancellationToken::new()))
    }

    /// Make at most one batch-advance attempt and return `None` rather than blocking until an
    /// event is available.
    pub fn next_if_any(&mut self) -> Result<Option<T>> {
        super::RUNTIME.block_on(self.inner.next_if_any(&CancellationToken::new()))
    }

    /// Returns whether the change stream will continue to receive events.
    pub fn is_alive(&self) -> bool {
        self.inner.is_alive()
    }

    /// Returns the cached resume token that can be used to resume after the most recently
    /// returned change.
    pub fn resume_token(&self) -> Option<ResumeToken> {
        self.inner.resume_token().cloned()
    }

    /// Update the type streamed values will be parsed as.
    pub fn with_type<D: DeserializeOwned>(self) -> ChangeStreamCursor<D> {
        ChangeStreamCursor {
            inner: self.inner.with_type(),
        }
    }
}
