//! Builds the `killCursors` command and validates its reply.

use bson::doc;
use serde::Deserialize;

use crate::{
    channel::CommandReply,
    error::{Error, Result},
    namespace::Namespace,
    operation::decode_reply,
};

/// Build a `killCursors` command body for a single cursor id.
pub(crate) fn build(ns: &Namespace, cursor_id: i64) -> bson::Document {
    doc! {
        "killCursors": ns.coll.clone(),
        "cursors": [cursor_id],
    }
}

/// Validate a `killCursors` reply: `cursor_id` must be reported killed, and must not be reported
/// not-found.
pub(crate) fn validate(reply: &CommandReply, server: &str, cursor_id: i64) -> Result<()> {
    let body: KillCursorsReplyBody = decode_reply(reply)?;

    if body.cursors_not_found.contains(&cursor_id) {
        return Err(Error::cursor_not_found(server, cursor_id));
    }
    if !body.cursors_killed.contains(&cursor_id) {
        return Err(Error::kill_cursors_failure(server, cursor_id));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KillCursorsReplyBody {
    #[serde(default)]
    cursors_killed: Vec<i64>,
    #[serde(default)]
    cursors_not_found: Vec<i64>,
}
