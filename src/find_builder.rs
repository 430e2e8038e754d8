//! [`FindBuilder`]: a mutable find specification that freezes itself on first execution.

use std::{sync::Arc, time::Duration};

use bson::{Bson, Document};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::{
    binding::Binding,
    channel::CommandRequest,
    cursor::{BatchCursor, CursorBatch},
    error::{Error, Result},
    namespace::Namespace,
    operation::{self, count, explain, find},
    options::{
        Collation, CoreOptions, CountOptions, CursorType, FindOptions, Hint, ReadConcern,
        ReadPreference, SelectionCriteria,
    },
    retryable::RetryableRead,
};

/// The mutable state accumulated by a [`FindBuilder`] before it freezes.
#[derive(Clone, Debug, Default)]
struct FindSpec {
    namespace: Namespace,
    filter: Document,
    projection: Option<Document>,
    sort: Option<Document>,
    hint: Option<Hint>,
    min: Option<Document>,
    max: Option<Document>,
    collation: Option<Collation>,
    skip: u64,
    limit: i64,
    batch_size: u32,
    max_time: Option<Duration>,
    max_await_time: Option<Duration>,
    tailable: bool,
    await_data: bool,
    no_cursor_timeout: bool,
    allow_partial_results: bool,
    return_key: Option<bool>,
    show_record_id: Option<bool>,
    read_preference: Option<ReadPreference>,
    read_concern: Option<ReadConcern>,
    retry_requested: Option<bool>,
    comment: Option<Bson>,
}

impl FindSpec {
    fn new(namespace: Namespace, filter: Document) -> Self {
        Self {
            namespace,
            filter,
            ..Default::default()
        }
    }

    fn cursor_type(&self) -> CursorType {
        match (self.tailable, self.await_data) {
            (true, true) => CursorType::TailableAwait,
            (true, false) => CursorType::Tailable,
            (false, _) => CursorType::NonTailable,
        }
    }

    fn selection_criteria(&self) -> Option<SelectionCriteria> {
        self.read_preference.clone().map(SelectionCriteria::from)
    }

    fn to_find_options(&self) -> FindOptions {
        FindOptions::builder()
            .allow_partial_results(Some(self.allow_partial_results).filter(|b| *b))
            .batch_size(Some(self.batch_size).filter(|n| *n != 0))
            .comment(self.comment.clone())
            .cursor_type(Some(self.cursor_type()))
            .hint(self.hint.clone())
            .max(self.max.clone())
            .max_await_time(self.max_await_time)
            .max_time(self.max_time)
            .min(self.min.clone())
            .no_cursor_timeout(Some(self.no_cursor_timeout).filter(|b| *b))
            .projection(self.projection.clone())
            .return_key(self.return_key)
            .show_record_id(self.show_record_id)
            .skip(Some(self.skip).filter(|n| *n != 0))
            .limit(Some(self.limit).filter(|n| *n != 0))
            .retry_reads(self.retry_requested)
            .collation(self.collation.clone())
            .read_concern(self.read_concern.clone())
            .selection_criteria(self.selection_criteria())
            .sort(self.sort.clone())
            .build()
    }

    fn to_count_options(&self) -> CountOptions {
        CountOptions::builder()
            .collation(self.collation.clone())
            .hint(self.hint.clone())
            .max_time(self.max_time)
            .read_concern(self.read_concern.clone())
            .selection_criteria(self.selection_criteria())
            .build()
    }
}

/// A mutable find specification over a single collection that freezes itself the first time it
/// commits to an execution (`count`, `size`, `explain`, or `iterate`).
///
/// Every mutator asserts the builder is still unfrozen, returning [`ErrorKind::Frozen`](crate::error::ErrorKind::Frozen)
/// otherwise. Reading state after freezing is fine; mutating it is not.
pub struct FindBuilder {
    binding: Arc<dyn Binding>,
    defaults: CoreOptions,
    spec: FindSpec,
    frozen: bool,
}

impl FindBuilder {
    /// Construct a new, unfrozen builder for a `find` against `namespace` matching `filter`.
    pub fn new(
        binding: Arc<dyn Binding>,
        defaults: CoreOptions,
        namespace: Namespace,
        filter: Document,
    ) -> Self {
        Self {
            binding,
            defaults,
            spec: FindSpec::new(namespace, filter),
            frozen: false,
        }
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.frozen {
            Err(Error::frozen())
        } else {
            Ok(())
        }
    }

    fn freeze(&mut self) -> Result<()> {
        self.ensure_mutable()?;
        self.frozen = true;
        Ok(())
    }

    /// Whether this builder has already committed to an execution.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn projection(&mut self, projection: Document) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.spec.projection = Some(projection);
        Ok(self)
    }

    pub fn sort(&mut self, sort: Document) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.spec.sort = Some(sort);
        Ok(self)
    }

    pub fn hint(&mut self, hint: Hint) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.spec.hint = Some(hint);
        Ok(self)
    }

    pub fn min(&mut self, min: Document) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.spec.min = Some(min);
        Ok(self)
    }

    pub fn max(&mut self, max: Document) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.spec.max = Some(max);
        Ok(self)
    }

    pub fn collation(&mut self, collation: Collation) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.spec.collation = Some(collation);
        Ok(self)
    }

    /// Set the number of documents to skip. Rejected if negative semantics are attempted by the
    /// caller's own type (the parameter is unsigned, matching the `skip ≥ 0` invariant).
    pub fn skip(&mut self, skip: u64) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.spec.skip = skip;
        Ok(self)
    }

    /// Set the maximum number of documents to return. `0` means unbounded; a negative value
    /// requests a single batch.
    pub fn limit(&mut self, limit: i64) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.spec.limit = limit;
        Ok(self)
    }

    pub fn batch_size(&mut self, batch_size: u32) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.spec.batch_size = batch_size;
        Ok(self)
    }

    pub fn max_time(&mut self, max_time: Duration) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.spec.max_time = Some(max_time);
        Ok(self)
    }

    pub fn max_await_time(&mut self, max_await_time: Duration) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.spec.max_await_time = Some(max_await_time);
        Ok(self)
    }

    /// Mark this as a tailable cursor over a capped collection.
    pub fn tailable(&mut self) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.spec.tailable = true;
        Ok(self)
    }

    /// Mark this as a tailable cursor that blocks server-side for new data. Implies `tailable`.
    pub fn await_data(&mut self) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.spec.tailable = true;
        self.spec.await_data = true;
        Ok(self)
    }

    pub fn no_cursor_timeout(&mut self) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.spec.no_cursor_timeout = true;
        Ok(self)
    }

    pub fn allow_partial_results(&mut self) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.spec.allow_partial_results = true;
        Ok(self)
    }

    pub fn return_key(&mut self, return_key: bool) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.spec.return_key = Some(return_key);
        Ok(self)
    }

    pub fn show_record_id(&mut self, show_record_id: bool) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.spec.show_record_id = Some(show_record_id);
        Ok(self)
    }

    /// Unsupported: exhaust cursors require a persistent socket this crate's `Channel` contract
    /// does not model. Always fails, whether or not the builder is frozen.
    pub fn exhaust(&mut self) -> Result<&mut Self> {
        Err(Error::invalid_argument(
            "exhaust cursors are not supported",
        ))
    }

    pub fn read_preference(&mut self, read_preference: ReadPreference) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.spec.read_preference = Some(read_preference);
        Ok(self)
    }

    pub fn read_concern(&mut self, read_concern: ReadConcern) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.spec.read_concern = Some(read_concern);
        Ok(self)
    }

    pub fn retry_reads(&mut self, retry_reads: bool) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.spec.retry_requested = Some(retry_reads);
        Ok(self)
    }

    pub fn comment(&mut self, comment: impl Into<Bson>) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.spec.comment = Some(comment.into());
        Ok(self)
    }

    fn retry_requested(&self) -> bool {
        self.spec
            .retry_requested
            .or(self.defaults.retry_reads)
            .unwrap_or(true)
    }

    /// Freeze the builder and issue a `count` command, ignoring `skip`/`limit`.
    pub async fn count(&mut self, cancellation: &CancellationToken) -> Result<u64> {
        self.freeze()?;
        self.run_count(None, None, cancellation).await
    }

    /// Freeze the builder and issue a `count` command honoring `skip`/`limit`.
    pub async fn size(&mut self, cancellation: &CancellationToken) -> Result<u64> {
        self.freeze()?;
        let skip = Some(self.spec.skip).filter(|s| *s != 0);
        let limit = Some(self.spec.limit).filter(|l| *l != 0);
        self.run_count(skip, limit, cancellation).await
    }

    async fn run_count(
        &self,
        skip: Option<u64>,
        limit: Option<i64>,
        cancellation: &CancellationToken,
    ) -> Result<u64> {
        let options = self.spec.to_count_options();
        let body = count::build(&self.spec.namespace, &self.spec.filter, skip, limit, Some(&options))?;
        let read_pref = self.spec.read_preference.clone();
        let retryable = RetryableRead::new(self.binding.as_ref(), self.retry_requested(), read_pref.as_ref());
        let db = self.spec.namespace.db.clone();
        let reply = retryable
            .run(cancellation, |channel, cancel| {
                let request = CommandRequest::new(db.clone(), body.clone());
                Box::pin(async move { channel.command(request, cancel).await })
            })
            .await?;
        if let Some(time) = reply.operation_time {
            self.binding.session().advance_operation_time(time);
        }
        count::parse(&reply)
    }

    /// Freeze the builder, build the underlying find command, wrap it in an `explain`, and
    /// return the raw reply document.
    pub async fn explain(
        &mut self,
        verbose: bool,
        cancellation: &CancellationToken,
    ) -> Result<Document> {
        self.freeze()?;
        let options = self.spec.to_find_options();
        let find_command = find::build(&self.spec.namespace, &self.spec.filter, Some(&options))?;
        let verbosity = if verbose {
            explain::Verbosity::AllPlansExecution
        } else {
            explain::Verbosity::QueryPlanner
        };
        let body = explain::build(find_command, verbosity);
        let read_pref = self.spec.read_preference.clone();
        let retryable = RetryableRead::new(self.binding.as_ref(), self.retry_requested(), read_pref.as_ref());
        let db = self.spec.namespace.db.clone();
        let reply = retryable
            .run(cancellation, |channel, cancel| {
                let request = CommandRequest::new(db.clone(), body.clone());
                Box::pin(async move { channel.command(request, cancel).await })
            })
            .await?;
        reply.raw.to_document().map_err(Into::into)
    }

    /// Freeze the builder, execute the find operation, and return a [`BatchCursor`] over the
    /// first batch.
    pub async fn iterate<T: DeserializeOwned>(
        &mut self,
        cancellation: &CancellationToken,
    ) -> Result<BatchCursor<T>> {
        self.freeze()?;

        let options = self.spec.to_find_options();
        let body = find::build(&self.spec.namespace, &self.spec.filter, Some(&options))?;
        let read_pref = self.spec.read_preference.clone();
        let retry_requested = self.retry_requested();

        let forked = self.binding.fork();
        let retryable = RetryableRead::new(forked.as_ref(), retry_requested, read_pref.as_ref());
        let db = self.spec.namespace.db.clone();
        let reply = retryable
            .run(cancellation, |channel, cancel| {
                let request = CommandRequest::new(db.clone(), body.clone());
                Box::pin(async move { channel.command(request, cancel).await })
            })
            .await?;
        if let Some(time) = reply.operation_time {
            forked.session().advance_operation_time(time);
        }

        let parsed: find::FindReply = operation::decode_reply(&reply)?;
        let ns = parsed.cursor.namespace()?;
        let batch = CursorBatch {
            cursor_id: parsed.cursor.id,
            documents: parsed.cursor.first_batch,
            post_batch_resume_token: parsed.cursor.resume_token(),
        };
        let tailable_await = matches!(self.spec.cursor_type(), CursorType::TailableAwait);

        Ok(BatchCursor::new(
            forked,
            read_pref,
            ns,
            batch,
            self.spec.batch_size,
            self.spec.limit,
            self.spec.max_await_time,
            tailable_await,
        ))
    }
}

#[cfg(test)]
mod test {
    use bson::doc;

    use super::*;
    use crate::{
        error::ErrorKind,
        mock::{reply_from_doc, MockBinding, ScriptedChannel},
    };

    #[tokio::test]
    async fn freezes_on_iterate_and_rejects_further_mutation() {
        let ns = Namespace::new("test_db", "test_coll");
        let reply = reply_from_doc(
            doc! {
                "ok": 1,
                "cursor": {
                    "id": 0_i64,
                    "ns": ns.to_string(),
                    "firstBatch": (0..10_i32)
                        .map(|n| bson::to_bson(&doc! { "_id": n }).unwrap())
                        .collect::<Vec<_>>(),
                },
            },
            17,
        );
        let channel = ScriptedChannel::new("a", vec![Ok(reply)]);
        let binding: Arc<dyn Binding> = Arc::new(MockBinding::new(vec![channel]));
        let cancel = CancellationToken::new();

        let mut builder = FindBuilder::new(binding, CoreOptions::default(), ns, Document::new());
        builder.limit(10).unwrap();

        let mut cursor: BatchCursor<Document> = builder.iterate(&cancel).await.unwrap();
        assert!(builder.is_frozen());

        let mutate_err = builder.limit(20).unwrap_err();
        assert!(matches!(*mutate_err.kind, ErrorKind::Frozen));

        assert!(cursor.move_next(&cancel).await.unwrap());
        assert_eq!(cursor.current().unwrap().len(), 10);
        assert!(!cursor.move_next(&cancel).await.unwrap());
    }
}
