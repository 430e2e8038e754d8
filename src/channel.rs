//! The `Channel` contract: a single, already-selected connection to a server, capable of
//! executing one command at a time.
//!
//! `Channel` is deliberately a thin trait. Connection establishment, authentication, TLS,
//! compression and wire framing are the responsibility of whatever concrete implementation a
//! caller plugs in; this crate only needs to send a command document and get a reply back.

use bson::{Document, RawDocumentBuf};
use tokio_util::sync::CancellationToken;

use crate::{error::Result, server_address::ServerAddress, BoxFuture};

/// A database command ready to be sent over a [`Channel`].
#[derive(Debug, Clone)]
pub struct CommandRequest {
    /// The database the command targets.
    pub database: String,

    /// The command document itself, e.g. `{find: "coll", filter: {}}`.
    pub body: Document,
}

impl CommandRequest {
    /// Construct a command request against the given database.
    pub fn new(database: impl Into<String>, body: Document) -> Self {
        Self {
            database: database.into(),
            body,
        }
    }
}

/// The reply to a command executed over a [`Channel`].
#[derive(Debug, Clone)]
pub struct CommandReply {
    /// The raw reply document, still including the `ok` field.
    pub raw: RawDocumentBuf,

    /// The server-reported operation time, if the reply carried one. Used to seed
    /// [`ChangeStreamResumeState::initial_operation_time`](crate::change_stream::ChangeStreamResumeState).
    pub operation_time: Option<bson::Timestamp>,

    /// The wire version of the server that produced this reply, used to decide retry/resume
    /// eligibility.
    pub max_wire_version: i32,
}

/// A single, already-established connection to a server.
///
/// Implementations are responsible for serializing `body` to bytes, writing it to the
/// underlying transport, reading the response, and deserializing it back — none of which this
/// crate has an opinion about.
pub trait Channel: Send + Sync {
    /// Execute a command on this channel, returning the raw server reply.
    ///
    /// A command failing with a server-reported error should be surfaced as
    /// `Err(ErrorKind::Command(..))`, not folded into the `Ok` reply.
    fn command<'a>(
        &'a self,
        request: CommandRequest,
        cancellation: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<CommandReply>>;

    /// The address of the server this channel is connected to.
    fn address(&self) -> &ServerAddress;
}
