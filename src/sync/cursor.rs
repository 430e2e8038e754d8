use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::{cursor::BatchCursor, error::Result};

/// A blocking wrapper around [`BatchCursor`](crate::cursor::BatchCursor), driving the underlying
/// async cursor to completion on a dedicated background runtime.
pub struct Cursor<T> {
    inner: BatchCursor<T>,
}

impl<T: DeserializeOwned> Cursor<T> {
    pub(crate) fn new(inner: BatchCursor<T>) -> Self {
        Self { inner }
    }

    /// Decode the batch most recently produced by [`move_next`](Self::move_next).
    pub fn current(&self) -> Result<Vec<T>> {
        self.inner.current()
    }

    /// Advance the cursor, blocking until the next batch has been fetched (or the cursor is
    /// confirmed drained).
    pub fn move_next(&mut self) -> Result<bool> {
        super::RUNTIME.block_on(self.inner.move_next(&CancellationToken::new()))
    }

    /// Release the server-side cursor, if any.
    pub fn close(&mut self) {
        super::RUNTIME.block_on(self.inner.close(&CancellationToken::new()));
    }

    /// Re-type this cursor's document deserialization target.
    pub fn with_type<D: DeserializeOwned>(self) -> Cursor<D> {
        Cursor {
            inner: self.inner.with_type(),
        }
    }
}
