use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use bson::{doc, Timestamp};
use tokio_util::sync::CancellationToken;

use super::ChangeStreamCursor;
use crate::{
    binding::Binding,
    channel::{Channel, CommandReply, CommandRequest},
    error::{CommandError, Error, ErrorKind, Result, CURSOR_NOT_FOUND},
    mock::{reply_from_doc, MockBinding},
    namespace::Namespace,
    operation::aggregate::AggregateTarget,
    options::ChangeStreamOptions,
    server_address::ServerAddress,
};

/// A [`Channel`] double that, like [`crate::mock::ScriptedChannel`], returns one scripted reply
/// per call, but additionally records every request it was asked to execute so a test can inspect
/// the exact command sent on a resume.
struct RecordingChannel {
    address: ServerAddress,
    replies: Mutex<VecDeque<Result<CommandReply>>>,
    requests: Mutex<Vec<CommandRequest>>,
}

impl RecordingChannel {
    fn new(replies: Vec<Result<CommandReply>>) -> Arc<Self> {
        Arc::new(Self {
            address: ServerAddress::new("a", None),
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<CommandRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Channel for RecordingChannel {
    fn command<'a>(
        &'a self,
        request: CommandRequest,
        _cancellation: &'a CancellationToken,
    ) -> crate::BoxFuture<'a, Result<CommandReply>> {
        self.requests.lock().unwrap().push(request);
        let next = self.replies.lock().unwrap().pop_front();
        Box::pin(async move {
            next.unwrap_or_else(|| Err(Error::internal("RecordingChannel ran out of scripted replies")))
        })
    }

    fn address(&self) -> &ServerAddress {
        &self.address
    }
}

fn aggregate_reply(
    cursor_id: i64,
    ns: &Namespace,
    events: &[bson::Document],
    operation_time: Option<Timestamp>,
) -> bson::Document {
    let mut doc = doc! {
        "ok": 1,
        "cursor": {
            "id": cursor_id,
            "ns": ns.to_string(),
            "firstBatch": events.to_vec(),
        },
    };
    if let Some(time) = operation_time {
        doc.insert("operationTime", time);
    }
    doc
}

fn kill_cursors_reply(cursor_id: i64) -> bson::Document {
    doc! {
        "ok": 1,
        "cursorsKilled": [cursor_id],
        "cursorsNotFound": [],
    }
}

fn insert_event(token: &str, value: i32) -> bson::Document {
    doc! {
        "_id": { "_data": token },
        "operationType": "insert",
        "fullDocument": { "x": value },
    }
}

fn command_error(code: i32) -> Error {
    ErrorKind::Command(CommandError {
        code,
        code_name: String::new(),
        message: "failed".to_string(),
    })
    .into()
}

#[tokio::test]
async fn resumes_across_cursor_not_found_without_duplicating_events() {
    let ns = Namespace::new("test_db", "test_coll");

    let initial = Ok(reply_from_doc(
        aggregate_reply(500, &ns, &[insert_event("tokenA", 1)], None),
        17,
    ));
    let get_more_failure = Err(command_error(CURSOR_NOT_FOUND));
    let kill_cursors = Ok(reply_from_doc(kill_cursors_reply(500), 17));
    let resume_reply = Ok(reply_from_doc(
        aggregate_reply(600, &ns, &[insert_event("tokenB", 2)], None),
        17,
    ));

    let channel = RecordingChannel::new(vec![initial, get_more_failure, kill_cursors, resume_reply]);
    let binding: Arc<dyn Binding> = Arc::new(MockBinding::new(vec![channel]));
    let cancel = CancellationToken::new();

    let mut stream: ChangeStreamCursor<bson::Document> = ChangeStreamCursor::new(
        binding,
        AggregateTarget::Collection(ns),
        vec![],
        ChangeStreamOptions::default(),
        true,
        &cancel,
    )
    .await
    .unwrap();

    let first = stream.next(&cancel).await.unwrap();
    assert_eq!(first.get_i32("x").unwrap(), 1);

    let second = stream.next(&cancel).await.unwrap();
    assert_eq!(second.get_i32("x").unwrap(), 2);

    assert!(stream.is_alive());
}

#[tokio::test]
async fn captures_initial_operation_time_and_uses_it_to_resume() {
    let ns = Namespace::new("test_db", "test_coll");
    let initial_time = Timestamp { time: 100, increment: 1 };

    let initial = Ok(reply_from_doc(
        aggregate_reply(700, &ns, &[], Some(initial_time)),
        17,
    ));
    let get_more_failure = Err(command_error(91)); // ShutdownInProgress: resumable, not fatal.
    let kill_cursors = Ok(reply_from_doc(kill_cursors_reply(700), 17));
    let resume_reply = Ok(reply_from_doc(
        aggregate_reply(800, &ns, &[insert_event("tokenC", 3)], None),
        17,
    ));

    let channel = RecordingChannel::new(vec![initial, get_more_failure, kill_cursors, resume_reply]);
    let recorder = channel.clone();
    let binding: Arc<dyn Binding> = Arc::new(MockBinding::new(vec![channel]));
    let cancel = CancellationToken::new();

    let mut stream: ChangeStreamCursor<bson::Document> = ChangeStreamCursor::new(
        binding,
        AggregateTarget::Collection(ns),
        vec![],
        ChangeStreamOptions::default(),
        true,
        &cancel,
    )
    .await
    .unwrap();

    // The first batch was empty: a single advance attempt reports no event without touching the
    // network again.
    assert_eq!(stream.next_if_any(&cancel).await.unwrap(), None);
    assert_eq!(recorder.requests().len(), 1);

    let doc = stream.next(&cancel).await.unwrap();
    assert_eq!(doc.get_i32("x").unwrap(), 3);

    let requests = recorder.requests();
    // initial aggregate, failed getMore, killCursors, resumed aggregate.
    assert_eq!(requests.len(), 4);
    let resume_body = &requests[3].body;
    let pipeline = resume_body.get_array("pipeline").unwrap();
    let stage = pipeline[0].as_document().unwrap();
    let change_stream_stage = stage.get_document("$changeStream").unwrap();
    assert_eq!(
        change_stream_stage.get_timestamp("startAtOperationTime").unwrap(),
        initial_time
    );
    assert!(!change_stream_stage.contains_key("resumeAfter"));
    assert!(!change_stream_stage.contains_key("startAfter"));
}
