//! [`AggregateOp`]: the change-stream specialization of the `aggregate` command, responsible for
//! prepending a `$changeStream` stage and re-issuing itself across a resume without going through
//! the normal retry policy a second time.

use bson::{doc, Bson, Document, Timestamp};
use tokio_util::sync::CancellationToken;

use crate::{
    binding::Binding,
    change_stream::{event::ResumeToken, options::ChangeStreamOptions},
    channel::{CommandReply, CommandRequest},
    error::Result,
    operation::aggregate::{self, AggregateTarget},
    options::AggregateOptions,
    retryable::RetryableRead,
    selection_criteria::ReadPreference,
};

/// Builds and (re)issues the `aggregate` command underlying a change stream.
#[derive(Clone, Debug)]
pub(crate) struct AggregateOp {
    target: AggregateTarget,
    user_pipeline: Vec<Document>,
    stream_options: ChangeStreamOptions,
    aggregate_options: AggregateOptions,
}

impl AggregateOp {
    /// Construct the aggregate op for a `watch` call. `stream_options` carries both the
    /// `$changeStream` stage fields and (via [`ChangeStreamOptions::aggregate_options`]) the
    /// outer aggregate-level options.
    pub(crate) fn new(
        target: AggregateTarget,
        user_pipeline: Vec<Document>,
        stream_options: ChangeStreamOptions,
    ) -> Self {
        let aggregate_options = stream_options.aggregate_options();
        Self {
            target,
            user_pipeline,
            stream_options,
            aggregate_options,
        }
    }

    /// Mark this op as watching the whole deployment rather than a single database or
    /// collection; the `$changeStream` stage gets `allChangesForCluster: true` and the target is
    /// the `admin` database.
    pub(crate) fn for_cluster(user_pipeline: Vec<Document>, stream_options: ChangeStreamOptions) -> Self {
        let mut op = Self::new(AggregateTarget::Database("admin".to_string()), user_pipeline, stream_options);
        op.stream_options.all_changes_for_cluster = Some(true);
        op
    }

    pub(crate) fn db_name(&self) -> &str {
        self.target.db_name()
    }

    pub(crate) fn read_preference(&self) -> Option<ReadPreference> {
        self.aggregate_options
            .selection_criteria
            .as_ref()
            .map(|criteria| criteria.as_read_pref().clone())
    }

    fn change_stream_stage(&self) -> Result<Document> {
        match bson::to_bson(&self.stream_options)? {
            Bson::Document(stage) => Ok(doc! { "$changeStream": stage }),
            other => Err(crate::error::Error::internal(format!(
                "change stream options did not serialize to a document: {:?}",
                other
            ))),
        }
    }

    fn full_pipeline(&self) -> Result<Vec<Document>> {
        let mut pipeline = Vec::with_capacity(self.user_pipeline.len() + 1);
        pipeline.push(self.change_stream_stage()?);
        pipeline.extend(self.user_pipeline.iter().cloned());
        Ok(pipeline)
    }

    fn command(&self) -> Result<Document> {
        aggregate::build(&self.target, &self.full_pipeline()?, Some(&self.aggregate_options))
    }

    /// Return a copy of this op with its `$changeStream` stage rebuilt to resume from
    /// `resumeAfter`, clearing any conflicting `startAfter`/`startAtOperationTime`.
    pub(crate) fn with_resume_after(&self, token: ResumeToken) -> Self {
        let mut next = self.clone();
        next.stream_options.resume_after = Some(token);
        next.stream_options.start_after = None;
        next.stream_options.start_at_operation_time = None;
        next
    }

    /// As [`with_resume_after`](Self::with_resume_after), but preserving `startAfter` as the
    /// resume field, matching whichever field the caller originally used.
    pub(crate) fn with_start_after(&self, token: ResumeToken) -> Self {
        let mut next = self.clone();
        next.stream_options.start_after = Some(token);
        next.stream_options.resume_after = None;
        next.stream_options.start_at_operation_time = None;
        next
    }

    pub(crate) fn with_start_at_operation_time(&self, time: Timestamp) -> Self {
        let mut next = self.clone();
        next.stream_options.start_at_operation_time = Some(time);
        next.stream_options.resume_after = None;
        next.stream_options.start_after = None;
        next
    }

    /// Run this aggregate through a [`RetryableRead`] context — used for the initial `watch`
    /// call, where the driver's single-retry policy still applies.
    pub(crate) async fn run(
        &self,
        binding: &dyn Binding,
        retry_requested: bool,
        cancellation: &CancellationToken,
    ) -> Result<CommandReply> {
        let read_pref = self.read_preference();
        let retryable = RetryableRead::new(binding, retry_requested, read_pref.as_ref());
        let body = self.command()?;
        let db = self.db_name().to_string();
        retryable
            .run(cancellation, |channel, cancel| {
                let request = CommandRequest::new(db.clone(), body.clone());
                Box::pin(async move { channel.command(request, cancel).await })
            })
            .await
    }

    /// Re-issue this aggregate directly, bypassing [`RetryableRead`]'s retry policy: used only
    /// from a change stream's resume flow, where the caller is already the one deciding whether
    /// to retry.
    pub(crate) async fn resume(
        &self,
        binding: &dyn Binding,
        cancellation: &CancellationToken,
    ) -> Result<CommandReply> {
        let read_pref = self.read_preference();
        let channel = binding.select_server(read_pref.as_ref(), cancellation).await?;
        let body = self.command()?;
        let request = CommandRequest::new(self.db_name().to_string(), body);
        channel.command(request, cancellation).await
    }
}
