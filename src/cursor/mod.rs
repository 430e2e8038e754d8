//! [`BatchCursor`]: a server-side cursor that pulls batches of documents via `getMore` and
//! reliably releases its server-side resources on close.

#[cfg(test)]
mod test;

use std::{collections::VecDeque, marker::PhantomData, sync::Arc, time::Duration};

use bson::RawDocumentBuf;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
#[cfg(feature = "tracing-unstable")]
use tracing::{debug, trace};

use crate::{
    binding::Binding,
    change_stream::event::ResumeToken,
    channel::CommandRequest,
    error::{Error, Result},
    namespace::Namespace,
    operation::{get_more, kill_cursors},
    selection_criteria::ReadPreference,
};

/// How long a best-effort `killCursors` is allowed to run for, independent of any cancellation
/// token the caller passes to [`BatchCursor::close`].
const KILL_CURSORS_DEADLINE: Duration = Duration::from_secs(10);

/// A single batch of raw documents and the server cursor id they were delivered with, as
/// returned by a `find`/`aggregate` command.
#[derive(Debug)]
pub(crate) struct CursorBatch {
    pub(crate) cursor_id: i64,
    pub(crate) documents: VecDeque<RawDocumentBuf>,
    pub(crate) post_batch_resume_token: Option<ResumeToken>,
}

/// A server-side cursor that owns a server-allocated cursor id and pulls successive batches of
/// `T` via `getMore`, truncating to a client-side limit and releasing the server cursor exactly
/// once on close.
///
/// Not safe for concurrent use: a single `BatchCursor` must only be driven by one task at a time.
pub struct BatchCursor<T> {
    binding: Arc<dyn Binding>,
    read_preference: Option<ReadPreference>,
    ns: Namespace,
    cursor_id: i64,
    first_batch: Option<VecDeque<RawDocumentBuf>>,
    current_batch: VecDeque<RawDocumentBuf>,
    returned_count: u64,
    limit: i64,
    batch_size: u32,
    max_time: Option<Duration>,
    tailable_await: bool,
    was_first_batch_empty: bool,
    post_batch_resume_token: Option<ResumeToken>,
    closed: bool,
    disposed: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> BatchCursor<T> {
    /// Construct a cursor over the first batch returned by a `find`/`aggregate` command.
    ///
    /// `binding` should be a fork dedicated to this cursor: it is disposed exactly once, when
    /// the cursor closes.
    pub(crate) fn new(
        binding: Arc<dyn Binding>,
        read_preference: Option<ReadPreference>,
        ns: Namespace,
        batch: CursorBatch,
        batch_size: u32,
        limit: i64,
        max_time: Option<Duration>,
        tailable_await: bool,
    ) -> Self {
        let was_first_batch_empty = batch.documents.is_empty();
        Self {
            binding,
            read_preference,
            ns,
            cursor_id: batch.cursor_id,
            first_batch: Some(batch.documents),
            current_batch: VecDeque::new(),
            returned_count: 0,
            limit,
            batch_size,
            max_time,
            tailable_await,
            was_first_batch_empty,
            post_batch_resume_token: batch.post_batch_resume_token,
            closed: false,
            disposed: false,
            _marker: PhantomData,
        }
    }

    /// Whether the first batch delivered at construction was empty.
    pub fn was_first_batch_empty(&self) -> bool {
        self.was_first_batch_empty
    }

    /// The most recently reported post-batch resume token, if any.
    pub fn post_batch_resume_token(&self) -> Option<&ResumeToken> {
        self.post_batch_resume_token.as_ref()
    }

    /// The server-side cursor id, `0` once exhausted or closed.
    pub fn cursor_id(&self) -> i64 {
        self.cursor_id
    }

    /// Decode the batch most recently produced by [`move_next`](Self::move_next).
    pub fn current(&self) -> Result<Vec<T>> {
        self.current_batch
            .iter()
            .map(|raw| Ok(bson::from_slice(raw.as_bytes())?))
            .collect()
    }

    /// Advance the cursor, fetching another batch via `getMore` if the current one is exhausted
    /// and the server cursor is still open. Returns `false` once the cursor is drained.
    ///
    /// A drained cursor is not the same as a closed one: once `move_next` returns `false`, later
    /// calls keep returning `Ok(false)` rather than erroring. Only an explicit [`close`](Self::close)
    /// call puts the cursor into the state where further calls raise an error.
    pub async fn move_next(&mut self, cancellation: &CancellationToken) -> Result<bool> {
        if self.closed {
            return Err(Error::internal("cursor is closed"));
        }
        if cancellation.is_cancelled() {
            return Err(Error::internal("move_next cancelled"));
        }

        if let Some(first) = self.first_batch.take() {
            self.apply_batch(first);
            if self.cursor_id == 0 || self.limit_reached() {
                self.release(cancellation).await;
            }
            return Ok(true);
        }

        if self.cursor_id == 0 || self.limit_reached() {
            return Ok(false);
        }

        let channel = self
            .binding
            .select_server(self.read_preference.as_ref(), cancellation)
            .await?;
        let body = get_more::build(
            &self.ns,
            self.cursor_id,
            self.calc_next_return(),
            self.max_time.filter(|_| self.tailable_await),
        )?;
        #[cfg(feature = "tracing-unstable")]
        trace!(cursor_id = self.cursor_id, server = %channel.address(), "issuing getMore");
        let request = CommandRequest::new(self.ns.db.clone(), body);
        let address = channel.address().to_string();
        let cursor_id = self.cursor_id;
        let reply = channel.command(request, cancellation).await.map_err(|err| {
            if err.is_cursor_not_found() {
                Error::cursor_not_found(address, cursor_id)
            } else {
                err
            }
        })?;
        if let Some(time) = reply.operation_time {
            self.binding.session().advance_operation_time(time);
        }
        let result = get_more::parse(&reply)?;

        self.cursor_id = result.id;
        if let Some(token) = result.post_batch_resume_token {
            self.post_batch_resume_token = Some(token);
        }
        self.apply_batch(result.batch);

        if self.cursor_id == 0 || self.limit_reached() {
            self.release(cancellation).await;
        }

        Ok(true)
    }

    /// `batch_size` to request on the next `getMore`: the configured batch size, clamped to the
    /// remaining room under `limit`.
    fn calc_next_return(&self) -> Option<u32> {
        if self.limit == 0 {
            return if self.batch_size == 0 {
                None
            } else {
                Some(self.batch_size)
            };
        }
        let remaining = (self.limit as u64).saturating_sub(self.returned_count);
        if self.batch_size > 0 && (self.batch_size as u64) <= remaining {
            Some(self.batch_size)
        } else {
            Some(remaining.min(u32::MAX as u64) as u32)
        }
    }

    fn limit_reached(&self) -> bool {
        self.limit > 0 && self.returned_count >= self.limit as u64
    }

    /// Apply a freshly received batch: truncate to `limit` if necessary and record it as the
    /// current batch.
    fn apply_batch(&mut self, mut batch: VecDeque<RawDocumentBuf>) {
        if self.limit > 0 {
            let remaining = (self.limit as u64).saturating_sub(self.returned_count);
            if batch.len() as u64 > remaining {
                batch.truncate(remaining as usize);
            }
        }
        self.returned_count += batch.len() as u64;
        self.current_batch = batch;
    }

    /// Explicitly close the cursor: release server-side resources and put it into a state where
    /// any later call raises an error. Use this to give up on a cursor before it drains
    /// naturally; a cursor that has simply drained does not need it (and calling it afterward is
    /// a harmless no-op, since [`release`](Self::release) already ran).
    pub async fn close(&mut self, cancellation: &CancellationToken) {
        self.closed = true;
        self.release(cancellation).await;
    }

    /// Release the server-side cursor, if any, and dispose this cursor's binding fork.
    /// Idempotent; never returns an error to the caller, matching the spec's "close never
    /// throws". Does not mark the cursor `closed`: this also runs when the cursor drains
    /// naturally, after which `move_next` should keep returning `Ok(false)` rather than erroring.
    async fn release(&mut self, _cancellation: &CancellationToken) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        if self.cursor_id != 0 {
            let cursor_id = self.cursor_id;
            let ns = self.ns.clone();
            let binding = self.binding.clone();
            let outcome = crate::runtime::timeout(KILL_CURSORS_DEADLINE, async move {
                let internal_cancel = CancellationToken::new();
                let channel = binding.select_server(None, &internal_cancel).await?;
                let body = kill_cursors::build(&ns, cursor_id);
                let request = CommandRequest::new(ns.db.clone(), body);
                let reply = channel.command(request, &internal_cancel).await?;
                kill_cursors::validate(&reply, &channel.address().to_string(), cursor_id)
            })
            .await;

            if let Err(_err) = outcome.and_then(std::convert::identity) {
                #[cfg(feature = "tracing-unstable")]
                debug!(cursor_id, error = %_err, "killCursors failed; swallowing");
            }
        }

        self.cursor_id = 0;
        self.binding.dispose();
    }

    /// Re-type this cursor's document deserialization target without re-issuing the underlying
    /// query, decoding `current()` against the new target on the next call.
    pub fn with_type<D: DeserializeOwned>(self) -> BatchCursor<D> {
        BatchCursor {
            binding: self.binding,
            read_preference: self.read_preference,
            ns: self.ns,
            cursor_id: self.cursor_id,
            first_batch: self.first_batch,
            current_batch: self.current_batch,
            returned_count: self.returned_count,
            limit: self.limit,
            batch_size: self.batch_size,
            max_time: self.max_time,
            tailable_await: self.tailable_await,
            was_first_batch_empty: self.was_first_batch_empty,
            post_batch_resume_token: self.post_batch_resume_token,
            closed: self.closed,
            disposed: self.disposed,
            _marker: PhantomData,
        }
    }
}
