//! In-memory [`Binding`]/[`Channel`] test doubles used by this crate's own unit tests.
//!
//! These are not part of the public API; real callers supply their own `Binding`/`Channel`
//! implementations backed by an actual connection pool and topology description.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use bson::{Document, RawDocumentBuf};
use tokio_util::sync::CancellationToken;

use crate::{
    binding::{Binding, Session},
    channel::{Channel, CommandReply, CommandRequest},
    error::{Error, Result},
    selection_criteria::ReadPreference,
    server_address::ServerAddress,
    BoxFuture,
};

/// Build a [`CommandReply`] from a literal reply document, as if it had just come off the wire.
pub(crate) fn reply_from_doc(doc: Document, max_wire_version: i32) -> CommandReply {
    let operation_time = match doc.get("operationTime") {
        Some(bson::Bson::Timestamp(ts)) => Some(*ts),
        _ => None,
    };
    CommandReply {
        raw: RawDocumentBuf::from_document(&doc).expect("test reply document encodes as BSON"),
        operation_time,
        max_wire_version,
    }
}

/// A [`Channel`] double that always fails, used to simulate a broken connection.
pub(crate) struct MockChannel {
    address: ServerAddress,
}

impl MockChannel {
    pub(crate) fn new(host: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            address: ServerAddress::new(host, None),
        })
    }
}

impl Channel for MockChannel {
    fn command<'a>(
        &'a self,
        _request: CommandRequest,
        _cancellation: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<CommandReply>> {
        Box::pin(async {
            Err(Error::internal(
                "MockChannel does not execute commands; tests should supply their own closure \
                 to RetryableRead::run instead of calling Channel::command",
            ))
        })
    }

    fn address(&self) -> &ServerAddress {
        &self.address
    }
}

/// A [`Channel`] double that returns a fixed, scripted sequence of replies, one per call to
/// `command`, erroring once the script is exhausted.
pub(crate) struct ScriptedChannel {
    address: ServerAddress,
    replies: Mutex<VecDeque<Result<CommandReply>>>,
}

impl ScriptedChannel {
    pub(crate) fn new(host: impl Into<String>, replies: Vec<Result<CommandReply>>) -> Arc<Self> {
        Arc::new(Self {
            address: ServerAddress::new(host, None),
            replies: Mutex::new(replies.into()),
        })
    }
}

impl Channel for ScriptedChannel {
    fn command<'a>(
        &'a self,
        _request: CommandRequest,
        _cancellation: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<CommandReply>> {
        let next = self.replies.lock().unwrap().pop_front();
        Box::pin(async move {
            next.unwrap_or_else(|| Err(Error::internal("ScriptedChannel ran out of scripted replies")))
        })
    }

    fn address(&self) -> &ServerAddress {
        &self.address
    }
}

struct MockSessionState {
    operation_time: Mutex<Option<bson::Timestamp>>,
    retryable_reads: bool,
}

impl Session for MockSessionState {
    fn operation_time(&self) -> Option<bson::Timestamp> {
        *self.operation_time.lock().unwrap()
    }

    fn advance_operation_time(&self, time: bson::Timestamp) {
        let mut guard = self.operation_time.lock().unwrap();
        if guard.map(|current| time > current).unwrap_or(true) {
            *guard = Some(time);
        }
    }

    fn supports_retryable_reads(&self) -> bool {
        self.retryable_reads
    }
}

/// A [`Binding`] double that hands out channels from a fixed list, advancing to the next on every
/// call to `select_server` (saturating at the last one once exhausted). Forks share the same
/// channel sequence and session state as the binding they were forked from, matching the real
/// contract that a session survives across forks.
pub(crate) struct MockBinding {
    channels: Vec<Arc<dyn Channel>>,
    next: Arc<AtomicUsize>,
    session: Arc<MockSessionState>,
}

impl MockBinding {
    pub(crate) fn new<C: Channel + 'static>(channels: Vec<Arc<C>>) -> Self {
        Self {
            channels: channels
                .into_iter()
                .map(|c| -> Arc<dyn Channel> { c })
                .collect(),
            next: Arc::new(AtomicUsize::new(0)),
            session: Arc::new(MockSessionState {
                operation_time: Mutex::new(None),
                retryable_reads: true,
            }),
        }
    }
}

impl Binding for MockBinding {
    fn select_server<'a>(
        &'a self,
        _read_preference: Option<&'a ReadPreference>,
        _cancellation: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Arc<dyn Channel>>> {
        let index = self
            .next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some((n + 1).min(self.channels.len().saturating_sub(1)))
            })
            .unwrap_or(0);
        let channel = self.channels[index.min(self.channels.len() - 1)].clone();
        Box::pin(async move { Ok(channel) })
    }

    fn session(&self) -> &dyn Session {
        self.session.as_ref()
    }

    fn fork(&self) -> Arc<dyn Binding> {
        Arc::new(MockBinding {
            channels: self.channels.clone(),
            next: self.next.clone(),
            session: self.session.clone(),
        })
    }

    fn dispose(&self) {}
}
