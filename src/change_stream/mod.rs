//! [`ChangeStreamCursor`]: a long-lived, resumable iterator over change events, layered on top of
//! a [`BatchCursor`] of raw change event documents.

pub mod event;
pub(crate) mod options;

#[cfg(test)]
mod test;

use std::{collections::VecDeque, sync::Arc};

use bson::Timestamp;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
#[cfg(feature = "tracing-unstable")]
use tracing::debug;

use crate::{
    aggregate_op::AggregateOp,
    binding::Binding,
    change_stream::{
        event::{ChangeStreamEvent, ResumeToken},
        options::ChangeStreamOptions,
    },
    cursor::{BatchCursor, CursorBatch},
    error::{Error, Result},
    operation,
    selection_criteria::ReadPreference,
};

pub use crate::operation::aggregate::AggregateTarget;

/// Which of the two mutually exclusive resume fields the caller originally supplied, so a resume
/// driven purely by `post_batch_resume_token` can preserve it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ResumeFieldKind {
    ResumeAfter,
    StartAfter,
}

/// A resumable cursor over decoded change events.
///
/// Not safe for concurrent use, for the same reason as [`BatchCursor`]: a single instance must
/// only be driven by one task at a time.
pub struct ChangeStreamCursor<T> {
    binding: Arc<dyn Binding>,
    op: AggregateOp,
    read_preference: Option<ReadPreference>,
    batch_size: u32,
    max_await_time: Option<std::time::Duration>,
    resume_field_kind: ResumeFieldKind,
    post_batch_resume_token: Option<ResumeToken>,
    last_yielded_document_id: Option<ResumeToken>,
    initial_operation_time: Option<Timestamp>,
    max_wire_version: i32,
    no_explicit_start: bool,
    queue: VecDeque<ChangeStreamEvent<T>>,
    inner: BatchCursor<ChangeStreamEvent<T>>,
    alive: bool,
}

impl<T: DeserializeOwned> ChangeStreamCursor<T> {
    /// Issue the initial `aggregate` and construct a cursor over its first batch. This is the
    /// entry point for opening a change stream: there is no `Client`/`Collection` wrapper in this
    /// crate, so a caller constructs a `ChangeStreamCursor` directly from its own `Binding`.
    pub async fn new(
        binding: Arc<dyn Binding>,
        target: AggregateTarget,
        user_pipeline: Vec<bson::Document>,
        stream_options: ChangeStreamOptions,
        retry_requested: bool,
        cancellation: &CancellationToken,
    ) -> Result<Self> {
        let no_explicit_start = stream_options.resume_after.is_none()
            && stream_options.start_after.is_none()
            && stream_options.start_at_operation_time.is_none();
        let resume_field_kind = if stream_options.start_after.is_some() {
            ResumeFieldKind::StartAfter
        } else {
            ResumeFieldKind::ResumeAfter
        };
        let batch_size = stream_options.batch_size.unwrap_or(0);
        let max_await_time = stream_options.max_await_time;
        let read_preference = stream_options
            .selection_criteria
            .clone()
            .map(|criteria| criteria.as_read_pref().clone());

        let op = AggregateOp::new(target, user_pipeline, stream_options);

        let forked = binding.fork();
        let reply = op.run(forked.as_ref(), retry_requested, cancellation).await?;
        if let Some(time) = reply.operation_time {
            forked.session().advance_operation_time(time);
        }
        let max_wire_version = reply.max_wire_version;

        let parsed: AggregateReply = operation::decode_reply(&reply)?;
        let ns = parsed.cursor.namespace()?;
        let post_batch_resume_token = parsed.cursor.resume_token();
        let batch = CursorBatch {
            cursor_id: parsed.cursor.id,
            documents: parsed.cursor.first_batch,
            post_batch_resume_token: post_batch_resume_token.clone(),
        };

        let inner = BatchCursor::new(
            forked.clone(),
            read_preference.clone(),
            ns,
            batch,
            batch_size,
            0,
            max_await_time,
            true,
        );

        let initial_operation_time = if no_explicit_start
            && max_wire_version >= 7
            && inner.was_first_batch_empty()
            && post_batch_resume_token.is_none()
        {
            forked.session().operation_time()
        } else {
            None
        };

        Ok(Self {
            binding,
            op,
            read_preference,
            batch_size,
            max_await_time,
            resume_field_kind,
            post_batch_resume_token,
            last_yielded_document_id: None,
            initial_operation_time,
            max_wire_version,
            no_explicit_start,
            queue: VecDeque::new(),
            inner,
            alive: true,
        })
    }

    /// Whether this change stream will continue to receive events, i.e. has not terminated due to
    /// a non-resumable error.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// The most recently recorded resume token, usable to manually resume after this cursor is
    /// dropped.
    pub fn resume_token(&self) -> Option<&ResumeToken> {
        self.post_batch_resume_token
            .as_ref()
            .or(self.last_yielded_document_id.as_ref())
    }

    /// Re-type this change stream's document deserialization target.
    ///
    /// Any events already buffered in `queue` are dropped — they've already been decoded against
    /// the old type and can't be re-typed without re-fetching from the server.
    pub fn with_type<D: DeserializeOwned>(self) -> ChangeStreamCursor<D> {
        ChangeStreamCursor {
            binding: self.binding,
            op: self.op,
            read_preference: self.read_preference,
            batch_size: self.batch_size,
            max_await_time: self.max_await_time,
            resume_field_kind: self.resume_field_kind,
            post_batch_resume_token: self.post_batch_resume_token,
            last_yielded_document_id: self.last_yielded_document_id,
            initial_operation_time: self.initial_operation_time,
            max_wire_version: self.max_wire_version,
            no_explicit_start: self.no_explicit_start,
            queue: VecDeque::new(),
            inner: self.inner.with_type(),
            alive: self.alive,
        }
    }

    /// Block until the next event is available.
    pub async fn next(&mut self, cancellation: &CancellationToken) -> Result<T> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Ok(self.take_event(event)?);
            }
            self.ensure_batch(cancellation).await?;
        }
    }

    /// Make at most one batch-advance attempt and return `None` rather than blocking until an
    /// event is available.
    pub async fn next_if_any(&mut self, cancellation: &CancellationToken) -> Result<Option<T>> {
        if self.queue.is_empty() {
            self.ensure_batch(cancellation).await?;
        }
        match self.queue.pop_front() {
            Some(event) => Ok(Some(self.take_event(event)?)),
            None => Ok(None),
        }
    }

    /// Record the event's resume token before handing back its decoded document.
    fn take_event(&mut self, event: ChangeStreamEvent<T>) -> Result<T> {
        self.last_yielded_document_id = Some(event.id.clone());
        event
            .full_document
            .ok_or_else(|| Error::invalid_argument("change stream event had no full document"))
    }

    async fn ensure_batch(&mut self, cancellation: &CancellationToken) -> Result<()> {
        if !self.alive {
            return Err(Error::invalid_argument(
                "change stream is no longer alive after a fatal error",
            ));
        }

        let mut resumed = false;
        loop {
            match self.inner.move_next(cancellation).await {
                Ok(true) => {
                    if let Some(token) = self.inner.post_batch_resume_token() {
                        self.post_batch_resume_token = Some(token.clone());
                    }
                    let docs = self.inner.current()?;
                    self.queue.extend(docs);
                    return Ok(());
                }
                Ok(false) => {
                    // A drained inner cursor is a resume trigger: change streams are always
                    // tailable-await, so draining should not normally happen.
                    if resumed {
                        return Err(Error::invalid_argument(
                            "change stream cursor drained again immediately after a resume",
                        ));
                    }
                    resumed = true;
                    self.resume(cancellation).await?;
                }
                Err(err) if err.is_resumable() && !resumed => {
                    resumed = true;
                    #[cfg(feature = "tracing-unstable")]
                    debug!(error = %err, "change stream cursor failed with a resumable error; resuming");
                    self.resume(cancellation).await?;
                }
                Err(err) => {
                    if !err.is_resumable() {
                        self.alive = false;
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn resume(&mut self, cancellation: &CancellationToken) -> Result<()> {
        self.inner.close(cancellation).await;

        let resumed_op = if let Some(token) = self.post_batch_resume_token.clone() {
            match self.resume_field_kind {
                ResumeFieldKind::StartAfter => self.op.with_start_after(token),
                ResumeFieldKind::ResumeAfter => self.op.with_resume_after(token),
            }
        } else if let Some(token) = self.last_yielded_document_id.clone() {
            self.op.with_resume_after(token)
        } else if let Some(time) = self.initial_operation_time {
            self.op.with_start_at_operation_time(time)
        } else {
            self.op.clone()
        };
        self.op = resumed_op;

        let forked = self.binding.fork();
        let reply = self.op.resume(forked.as_ref(), cancellation).await?;
        if let Some(time) = reply.operation_time {
            forked.session().advance_operation_time(time);
        }

        let parsed: AggregateReply = operation::decode_reply(&reply)?;
        let ns = parsed.cursor.namespace()?;
        let new_token = parsed.cursor.resume_token();
        let batch = CursorBatch {
            cursor_id: parsed.cursor.id,
            documents: parsed.cursor.first_batch,
            post_batch_resume_token: new_token.clone(),
        };

        let inner = BatchCursor::new(
            forked.clone(),
            self.read_preference.clone(),
            ns,
            batch,
            self.batch_size,
            0,
            self.max_await_time,
            true,
        );

        if self.initial_operation_time.is_none()
            && self.no_explicit_start
            && reply.max_wire_version >= 7
            && inner.was_first_batch_empty()
            && new_token.is_none()
        {
            self.initial_operation_time = forked.session().operation_time();
        }

        self.inner = inner;
        Ok(())
    }
}

type AggregateReply = operation::CursorBody;
