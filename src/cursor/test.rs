use std::sync::Arc;

use bson::{doc, RawDocumentBuf};
use tokio_util::sync::CancellationToken;

use super::{BatchCursor, CursorBatch};
use crate::{
    binding::Binding,
    error::{CommandError, Error, ErrorKind},
    mock::{reply_from_doc, MockBinding, ScriptedChannel},
    namespace::Namespace,
};

fn raw_doc(n: i32) -> RawDocumentBuf {
    RawDocumentBuf::from_document(&doc! { "_id": n }).unwrap()
}

fn get_more_reply(cursor_id: i64, ns: &Namespace, batch: &[i32]) -> bson::Document {
    doc! {
        "ok": 1,
        "cursor": {
            "id": cursor_id,
            "ns": ns.to_string(),
            "nextBatch": batch.iter().map(|n| bson::to_bson(&doc! { "_id": n }).unwrap()).collect::<Vec<_>>(),
        },
    }
}

fn kill_cursors_reply(cursor_id: i64) -> bson::Document {
    doc! {
        "ok": 1,
        "cursorsKilled": [cursor_id],
        "cursorsNotFound": [],
    }
}

fn command_error(code: i32, code_name: &str) -> Error {
    ErrorKind::Command(CommandError {
        code,
        code_name: code_name.to_string(),
        message: "not primary".to_string(),
    })
    .into()
}

#[tokio::test]
async fn truncates_batches_to_limit_and_kills_cursor_on_last_batch() {
    let ns = Namespace::new("test_db", "test_coll");

    let get_more_1 = Ok(reply_from_doc(get_more_reply(100, &ns, &[5, 6, 7, 8, 9]), 17));
    let get_more_2 = Ok(reply_from_doc(get_more_reply(100, &ns, &[10, 11, 12, 13, 14]), 17));
    let kill_cursors = Ok(reply_from_doc(kill_cursors_reply(100), 17));
    let channel = ScriptedChannel::new("a", vec![get_more_1, get_more_2, kill_cursors]);
    let binding: Arc<dyn Binding> = Arc::new(MockBinding::new(vec![channel]));

    let first_batch = CursorBatch {
        cursor_id: 100,
        documents: (0..5).map(raw_doc).collect(),
        post_batch_resume_token: None,
    };
    let mut cursor: BatchCursor<bson::Document> =
        BatchCursor::new(binding, None, ns, first_batch, 5, 12, None, false);

    let cancel = CancellationToken::new();

    assert!(cursor.move_next(&cancel).await.unwrap());
    assert_eq!(cursor.current().unwrap().len(), 5);

    assert!(cursor.move_next(&cancel).await.unwrap());
    assert_eq!(cursor.current().unwrap().len(), 5);

    assert!(cursor.move_next(&cancel).await.unwrap());
    assert_eq!(cursor.current().unwrap().len(), 2);

    // limit reached: the cursor closed itself and killed the server-side cursor.
    assert_eq!(cursor.cursor_id(), 0);

    assert!(!cursor.move_next(&cancel).await.unwrap());
}

#[tokio::test]
async fn empty_first_batch_is_reported_and_does_not_kill_cursors() {
    let ns = Namespace::new("test_db", "test_coll");

    // No replies scripted: an empty first batch with cursor id 0 must never touch the channel.
    let channel = ScriptedChannel::new("a", vec![]);
    let binding: Arc<dyn Binding> = Arc::new(MockBinding::new(vec![channel]));

    let first_batch = CursorBatch {
        cursor_id: 0,
        documents: Default::default(),
        post_batch_resume_token: None,
    };
    let mut cursor: BatchCursor<bson::Document> =
        BatchCursor::new(binding, None, ns, first_batch, 0, 0, None, false);

    let cancel = CancellationToken::new();

    assert!(cursor.move_next(&cancel).await.unwrap());
    assert!(cursor.current().unwrap().is_empty());
    assert!(cursor.was_first_batch_empty());

    assert!(!cursor.move_next(&cancel).await.unwrap());
}

#[tokio::test]
async fn get_more_failure_propagates_without_an_internal_retry() {
    let ns = Namespace::new("test_db", "test_coll");

    let failure = Err(command_error(10107, "NotWritablePrimary"));
    let channel = ScriptedChannel::new("a", vec![failure]);
    let binding: Arc<dyn Binding> = Arc::new(MockBinding::new(vec![channel]));

    let first_batch = CursorBatch {
        cursor_id: 42,
        documents: (0..3).map(raw_doc).collect(),
        post_batch_resume_token: None,
    };
    let mut cursor: BatchCursor<bson::Document> =
        BatchCursor::new(binding, None, ns, first_batch, 0, 0, None, false);

    let cancel = CancellationToken::new();

    assert!(cursor.move_next(&cancel).await.unwrap());
    assert_eq!(cursor.current().unwrap().len(), 3);

    // A single scripted reply: if `move_next` retried internally, the `ScriptedChannel` would
    // error with "ran out of scripted replies" instead of surfacing the original command error.
    let err = cursor.move_next(&cancel).await.unwrap_err();
    assert_eq!(err.code(), Some(10107));
    assert_eq!(cursor.cursor_id(), 42);
}

#[tokio::test]
async fn get_more_cursor_not_found_is_remapped_to_the_typed_error() {
    let ns = Namespace::new("test_db", "test_coll");

    let failure = Err(command_error(43, "CursorNotFound"));
    let channel = ScriptedChannel::new("a", vec![failure]);
    let binding: Arc<dyn Binding> = Arc::new(MockBinding::new(vec![channel]));

    let first_batch = CursorBatch {
        cursor_id: 77,
        documents: (0..2).map(raw_doc).collect(),
        post_batch_resume_token: None,
    };
    let mut cursor: BatchCursor<bson::Document> =
        BatchCursor::new(binding, None, ns, first_batch, 0, 0, None, false);

    let cancel = CancellationToken::new();
    assert!(cursor.move_next(&cancel).await.unwrap());

    let err = cursor.move_next(&cancel).await.unwrap_err();
    assert!(matches!(*err.kind, ErrorKind::CursorNotFound { cursor_id: 77, .. }));
}
