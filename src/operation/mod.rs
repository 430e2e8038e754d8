//! Builders and reply parsers for the wire commands this crate issues.
//!
//! Unlike the teacher's `Operation` trait machinery (which binds command building to a
//! `StreamDescription` and a connection pool), everything here is a free function operating
//! directly on [`bson::Document`] and [`CommandReply`](crate::channel::CommandReply): this crate
//! has no connection pool or topology state of its own, only the [`Channel`](crate::channel::Channel)
//! contract, so there is nothing left for a trait object to abstract over.

pub(crate) mod aggregate;
pub(crate) mod count;
pub(crate) mod explain;
pub(crate) mod find;
pub(crate) mod get_more;
pub(crate) mod kill_cursors;

use std::collections::VecDeque;

use bson::{Bson, Document, RawDocumentBuf, Timestamp};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    change_stream::event::ResumeToken,
    channel::CommandReply,
    error::{CommandError, Error, ErrorKind, Result},
    namespace::Namespace,
};

/// Appends a serializable options struct onto `doc` as a flattened set of fields, the way the
/// teacher's `append_options` merges a `FindOptions`/`AggregateOptions` into a command body.
pub(crate) fn append_options<T: Serialize>(doc: &mut Document, options: Option<&T>) -> Result<()> {
    let Some(options) = options else {
        return Ok(());
    };
    match bson::to_bson(options)? {
        Bson::Document(d) => {
            doc.extend(d);
            Ok(())
        }
        other => Err(Error::internal(format!(
            "options did not serialize to a document: {:?}",
            other
        ))),
    }
}

fn is_ok(doc: &Document) -> bool {
    match doc.get("ok") {
        Some(Bson::Double(f)) => *f == 1.0,
        Some(Bson::Int32(i)) => *i == 1,
        Some(Bson::Int64(i)) => *i == 1,
        Some(Bson::Boolean(b)) => *b,
        _ => false,
    }
}

/// Decode a command reply, mapping a server-reported failure (`ok != 1`) to
/// [`ErrorKind::Command`] with any `errorLabels` preserved, and deserializing the body into `T`
/// on success.
pub(crate) fn decode_reply<T: DeserializeOwned>(reply: &CommandReply) -> Result<T> {
    let doc = reply.raw.to_document()?;
    if !is_ok(&doc) {
        let code = doc.get_i32("code").unwrap_or(0);
        let code_name = doc.get_str("codeName").unwrap_or_default().to_string();
        let message = doc.get_str("errmsg").unwrap_or_default().to_string();
        let labels = doc
            .get_array("errorLabels")
            .ok()
            .map(|arr| arr.iter().filter_map(|b| b.as_str()).map(String::from))
            .map(|it| it.collect::<Vec<_>>());
        return Err(
            Error::new(ErrorKind::Command(CommandError { code, code_name, message }), labels)
                .with_wire_version(reply.max_wire_version),
        );
    }
    Ok(bson::from_document(doc)?)
}

/// The decoded `cursor` subdocument shared by `find`/`aggregate`/`getMore` replies.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct CursorBody {
    pub(crate) cursor: CursorInfo,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct CursorInfo {
    pub(crate) id: i64,

    pub(crate) ns: String,

    #[serde(rename = "firstBatch", default)]
    pub(crate) first_batch: VecDeque<RawDocumentBuf>,

    #[serde(rename = "postBatchResumeToken")]
    pub(crate) post_batch_resume_token: Option<RawDocumentBuf>,

    #[serde(rename = "atClusterTime")]
    pub(crate) at_cluster_time: Option<Timestamp>,
}

impl CursorInfo {
    pub(crate) fn namespace(&self) -> Result<Namespace> {
        self.ns.parse()
    }

    pub(crate) fn resume_token(&self) -> Option<ResumeToken> {
        ResumeToken::from_raw(self.post_batch_resume_token.clone())
    }
}
