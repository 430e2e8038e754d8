//! Contains the result types returned from the operations in this crate.

use std::collections::VecDeque;

use bson::RawDocumentBuf;

use crate::{change_stream::event::ResumeToken, namespace::Namespace};

/// The decoded body of a `find`/`getMore` reply: the batch of documents returned plus enough
/// bookkeeping for [`BatchCursor`](crate::cursor::BatchCursor) to decide whether to fetch
/// another batch or report itself exhausted.
#[derive(Debug, Clone)]
pub(crate) struct GetMoreResult {
    /// The documents in this batch, in server-returned order.
    pub(crate) batch: VecDeque<RawDocumentBuf>,

    /// Whether the server has reported cursor id `0`, meaning no further batches are available.
    pub(crate) exhausted: bool,

    /// The post-batch resume token, present only on aggregate/`getMore` replies for a change
    /// stream.
    pub(crate) post_batch_resume_token: Option<ResumeToken>,

    /// The namespace the cursor was opened against.
    pub(crate) ns: Namespace,

    /// The server-assigned cursor id, `0` once exhausted.
    pub(crate) id: i64,
}
