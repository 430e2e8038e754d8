//! Contains the option structs accepted by the operations in this crate.
//!
//! These use the [`typed-builder`](https://crates.io/crates/typed-builder) crate to derive a
//! type-safe builder API. For example, to build [`FindOptions`] with only `limit` and
//! `batch_size` set:
//!
//! ```rust
//! # use mongodb_result_stream::options::FindOptions;
//! let options = FindOptions::builder()
//!     .limit(20)
//!     .batch_size(5)
//!     .build();
//! ```

pub use crate::{collation::*, concern::*, selection_criteria::*};

use std::time::Duration;

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use typed_builder::TypedBuilder;

use crate::{collation::Collation, concern::ReadConcern, selection_criteria::SelectionCriteria};

/// Describes the type of cursor to create for a `find` operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum CursorType {
    /// The default cursor type, which is closed by the server once the client has exhausted the
    /// results.
    NonTailable,

    /// A tailable cursor over a capped collection; stays open after the client exhausts the
    /// results, but does not block waiting for new data.
    Tailable,

    /// A tailable cursor that additionally blocks server-side waiting for new data to arrive,
    /// up to `max_await_time`.
    TailableAwait,
}

/// Specifies the options to a `find` operation, and by extension the derived `count`/`size`
/// operations built from the same spec.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, Deserialize, Serialize, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct FindOptions {
    /// If true, partial results may be returned from a sharded cluster if some shards are
    /// unreachable rather than erroring the whole operation.
    pub allow_partial_results: Option<bool>,

    /// The number of documents the server should return per batch.
    pub batch_size: Option<u32>,

    /// Tags the query with an arbitrary value for the database profiler/currentOp/logs.
    pub comment: Option<Bson>,

    /// The type of cursor to return.
    #[serde(skip)]
    pub cursor_type: Option<CursorType>,

    /// The index to use for this operation.
    pub hint: Option<Hint>,

    /// The exclusive upper bound for a specific index.
    pub max: Option<Document>,

    /// The maximum amount of time for the server to wait on new documents, only applicable for
    /// a [`CursorType::TailableAwait`] cursor.
    #[serde(skip)]
    pub max_await_time: Option<Duration>,

    /// The maximum amount of time the server should permit this operation to run for.
    #[serde(
        rename = "maxTimeMS",
        serialize_with = "crate::serde_util::serialize_duration_option_as_int_millis"
    )]
    pub max_time: Option<Duration>,

    /// The inclusive lower bound for a specific index.
    pub min: Option<Document>,

    /// Whether the server should close the cursor after a period of inactivity.
    pub no_cursor_timeout: Option<bool>,

    /// Limits the fields returned for each document.
    pub projection: Option<Document>,

    /// Whether to return only the `_id` field.
    pub return_key: Option<bool>,

    /// Whether the server should include the record identifier for each document.
    pub show_record_id: Option<bool>,

    /// The number of documents to skip before returning results.
    pub skip: Option<u64>,

    /// The maximum number of documents to return. Negative values request a single batch.
    #[serde(skip)]
    pub limit: Option<i64>,

    /// Whether the `find`/`getMore` pair should be retried once on a retryable error.
    #[serde(skip)]
    pub retry_reads: Option<bool>,

    /// A collation to use for string comparison.
    #[serde(skip)]
    pub collation: Option<Collation>,

    /// The read concern to use for this operation.
    #[serde(skip)]
    pub read_concern: Option<ReadConcern>,

    /// The criteria used to select a server for this operation.
    #[serde(skip)]
    pub selection_criteria: Option<SelectionCriteria>,

    /// Sort order for the results.
    pub sort: Option<Document>,
}

/// Either the name of an index, or an index specification document, used to force the server to
/// use a particular index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Hint {
    /// The name of an index.
    Name(String),

    /// A document specifying the keys of an index.
    Keys(Document),
}

/// Specifies the options to a `count` operation built from a frozen find specification.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct CountOptions {
    /// A collation to use for string comparison.
    pub collation: Option<Collation>,

    /// The index to use for this operation.
    pub hint: Option<Hint>,

    /// The maximum amount of time the server should permit this operation to run for.
    pub max_time: Option<Duration>,

    /// The read concern to use for this operation.
    pub read_concern: Option<ReadConcern>,

    /// The criteria used to select a server for this operation.
    pub selection_criteria: Option<SelectionCriteria>,
}

/// Specifies the options to an `aggregate` operation, including the change-stream specialization
/// in [`AggregateOp`](crate::aggregate_op::AggregateOp).
#[skip_serializing_none]
#[derive(Clone, Debug, Default, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct AggregateOptions {
    /// The number of documents the server should return per batch.
    pub batch_size: Option<u32>,

    /// A collation to use for string comparison.
    pub collation: Option<Collation>,

    /// The maximum amount of time for the server to wait on new data for a tailable-await
    /// aggregation cursor (i.e. a change stream).
    pub max_await_time: Option<Duration>,

    /// The maximum amount of time the server should permit this operation to run for.
    pub max_time: Option<Duration>,

    /// The read concern to use for this operation.
    pub read_concern: Option<ReadConcern>,

    /// The criteria used to select a server for this operation.
    pub selection_criteria: Option<SelectionCriteria>,

    /// Tags the query with an arbitrary value for the database profiler/currentOp/logs.
    pub comment: Option<Bson>,

    /// Whether this aggregation should be retried once on a retryable error. Honored only on the
    /// first attempt inside a [`RetryableRead`](crate::retryable::RetryableRead); a context may
    /// override it.
    pub retry_reads: Option<bool>,
}

/// Top-level defaults applied to any operation in this crate that does not override them
/// explicitly, analogous to the defaults a `Client`/`Database`/`Collection` carry in the full
/// driver.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct CoreOptions {
    /// Whether read operations should be retried once on a retryable error by default.
    pub retry_reads: Option<bool>,

    /// The default read concern applied when an operation does not specify one.
    pub read_concern: Option<ReadConcern>,

    /// The default server-selection criteria applied when an operation does not specify one.
    pub selection_criteria: Option<SelectionCriteria>,
}
