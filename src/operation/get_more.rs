//! Builds the `getMore` command and parses its reply into a [`GetMoreResult`].

use std::time::Duration;

use bson::doc;
use serde::Deserialize;

use crate::{
    change_stream::event::ResumeToken,
    channel::CommandReply,
    error::{Error, Result},
    namespace::Namespace,
    operation::decode_reply,
    results::GetMoreResult,
};

/// Build a `getMore` command body for `cursor_id` on `ns`.
///
/// `batch_size` should be the value of [`crate::cursor::BatchCursor::calc_next_return`], not the
/// find/aggregate spec's raw `batch_size`. `max_time` is only meaningful (and should only be set)
/// for a tailable-await cursor.
pub(crate) fn build(
    ns: &Namespace,
    cursor_id: i64,
    batch_size: Option<u32>,
    max_time: Option<Duration>,
) -> Result<bson::Document> {
    let mut body = doc! {
        "getMore": cursor_id,
        "collection": ns.coll.clone(),
    };

    if let Some(batch_size) = batch_size {
        if batch_size > i32::MAX as u32 {
            return Err(Error::invalid_argument(
                "the batch size must fit into a signed 32-bit integer",
            ));
        }
        if batch_size != 0 {
            body.insert("batchSize", batch_size);
        }
    }

    if let Some(max_time) = max_time {
        body.insert("maxTimeMS", max_time.as_millis().try_into().unwrap_or(i32::MAX));
    }

    Ok(body)
}

/// Parse a `getMore` reply.
pub(crate) fn parse(reply: &CommandReply) -> Result<GetMoreResult> {
    let body: GetMoreReplyBody = decode_reply(reply)?;
    Ok(GetMoreResult {
        batch: body.cursor.next_batch,
        exhausted: body.cursor.id == 0,
        post_batch_resume_token: ResumeToken::from_raw(body.cursor.post_batch_resume_token),
        id: body.cursor.id,
        ns: body.cursor.ns.parse()?,
    })
}

#[derive(Debug, Deserialize)]
struct GetMoreReplyBody {
    cursor: NextBatchBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NextBatchBody {
    id: i64,
    next_batch: std::collections::VecDeque<bson::RawDocumentBuf>,
    post_batch_resume_token: Option<bson::RawDocumentBuf>,
    ns: String,
}
