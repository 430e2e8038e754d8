//! Builds the `find` command and parses its cursor-shaped reply.

use bson::{doc, Document};

use crate::{
    error::{Error, Result},
    namespace::Namespace,
    operation::{append_options, CursorBody},
    options::{CursorType, FindOptions},
};

/// Build a `find` command body targeting `ns`.
pub(crate) fn build(ns: &Namespace, filter: &Document, options: Option<&FindOptions>) -> Result<Document> {
    let mut body = doc! {
        "find": ns.coll.clone(),
        "filter": filter.clone(),
    };

    if let Some(options) = options {
        if options.limit.map(|limit| limit < 0) == Some(true) {
            body.insert("singleBatch", true);
        }

        if options.batch_size.map(|n| n > i32::MAX as u32) == Some(true) {
            return Err(Error::invalid_argument(
                "the batch size must fit into a signed 32-bit integer",
            ));
        }

        match options.cursor_type {
            Some(CursorType::Tailable) => {
                body.insert("tailable", true);
            }
            Some(CursorType::TailableAwait) => {
                body.insert("tailable", true);
                body.insert("awaitData", true);
            }
            _ => {}
        }

        if let Some(limit) = options.limit {
            body.insert("limit", limit.unsigned_abs().min(i64::MAX as u64) as i64);
        }

        if let Some(collation) = &options.collation {
            body.insert("collation", bson::to_bson(collation)?);
        }

        if let Some(read_concern) = &options.read_concern {
            body.insert("readConcern", bson::to_bson(read_concern)?);
        }

        append_options(&mut body, Some(options))?;
    }

    Ok(body)
}

/// The cursor-shaped reply to a `find` command. Identical in shape to an `aggregate` reply.
pub(crate) type FindReply = CursorBody;
