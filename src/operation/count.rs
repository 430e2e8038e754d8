//! Builds the `count` command derived from a frozen find specification.

use bson::{doc, Document};
use serde::Deserialize;

use crate::{
    channel::CommandReply,
    error::Result,
    namespace::Namespace,
    operation::{append_options, decode_reply},
    options::CountOptions,
};

/// Build a `count` command body. `skip`/`limit` are forwarded only when non-zero, matching the
/// distinction between `FindBuilder::count` (ignores them) and `FindBuilder::size` (includes
/// them).
pub(crate) fn build(
    ns: &Namespace,
    filter: &Document,
    skip: Option<u64>,
    limit: Option<i64>,
    options: Option<&CountOptions>,
) -> Result<Document> {
    let mut body = doc! {
        "count": ns.coll.clone(),
        "query": filter.clone(),
    };

    if let Some(skip) = skip.filter(|s| *s != 0) {
        body.insert("skip", skip as i64);
    }
    if let Some(limit) = limit.filter(|l| *l != 0) {
        body.insert("limit", limit);
    }

    append_options(&mut body, options)?;

    Ok(body)
}

/// Parse a `count` reply, mapping a `ns not found` failure to zero rather than propagating.
pub(crate) fn parse(reply: &CommandReply) -> Result<u64> {
    match decode_reply::<CountReplyBody>(reply) {
        Ok(body) => Ok(body.n),
        Err(err) if err.code() == Some(26) => Ok(0), // NamespaceNotFound
        Err(err) => Err(err),
    }
}

#[derive(Debug, Deserialize)]
struct CountReplyBody {
    n: u64,
}
