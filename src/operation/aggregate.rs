//! Builds the `aggregate` command and parses its cursor-shaped reply.

use bson::{doc, Bson, Document};

use crate::{error::Result, namespace::Namespace, operation::CursorBody, options::AggregateOptions};

/// The target of an `aggregate` command: either a whole database (pipeline target `1`) or a
/// single collection's namespace.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum AggregateTarget {
    /// Target an entire database, for a cluster-wide change stream.
    Database(String),
    /// Target a single collection's namespace.
    Collection(Namespace),
}

impl AggregateTarget {
    fn command_value(&self) -> Bson {
        match self {
            AggregateTarget::Database(_) => Bson::Int32(1),
            AggregateTarget::Collection(ns) => Bson::String(ns.coll.clone()),
        }
    }

    pub(crate) fn db_name(&self) -> &str {
        match self {
            AggregateTarget::Database(name) => name.as_str(),
            AggregateTarget::Collection(ns) => ns.db.as_str(),
        }
    }
}

impl From<Namespace> for AggregateTarget {
    fn from(ns: Namespace) -> Self {
        AggregateTarget::Collection(ns)
    }
}

impl From<String> for AggregateTarget {
    fn from(db_name: String) -> Self {
        AggregateTarget::Database(db_name)
    }
}

/// Build an `aggregate` command body running `pipeline` against `target`.
pub(crate) fn build(
    target: &AggregateTarget,
    pipeline: &[Document],
    options: Option<&AggregateOptions>,
) -> Result<Document> {
    let mut cursor_doc = Document::new();
    let mut body = doc! {
        "aggregate": target.command_value(),
        "pipeline": pipeline.to_vec(),
    };

    if let Some(options) = options {
        if let Some(batch_size) = options.batch_size {
            cursor_doc.insert("batchSize", batch_size);
        }
        if let Some(collation) = &options.collation {
            body.insert("collation", bson::to_bson(collation)?);
        }
        if let Some(max_await_time) = options.max_await_time {
            body.insert(
                "maxAwaitTimeMS",
                max_await_time.as_millis().try_into().unwrap_or(i32::MAX),
            );
        }
        if let Some(max_time) = options.max_time {
            body.insert("maxTimeMS", max_time.as_millis().try_into().unwrap_or(i32::MAX));
        }
        if let Some(read_concern) = &options.read_concern {
            body.insert("readConcern", bson::to_bson(read_concern)?);
        }
        if let Some(comment) = &options.comment {
            body.insert("comment", comment.clone());
        }
    }

    body.insert("cursor", cursor_doc);

    Ok(body)
}

/// The cursor-shaped reply to an `aggregate` command.
pub(crate) type AggregateReply = CursorBody;
