//! The `Binding` and `Session` contracts: the caller-supplied notion of "a logical session, able
//! to select a server and hand out channels to it".
//!
//! Everything this crate does to talk to a server goes through a `Binding`. Server selection,
//! topology monitoring, connection pooling and causal-consistency bookkeeping are the caller's
//! responsibility; this crate only needs to select a channel, read back the session's operation
//! time, and fork/dispose bindings as cursors are replicated or closed.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{channel::Channel, error::Result, selection_criteria::ReadPreference, BoxFuture};

/// A logical session capable of selecting a server and handing out a [`Channel`] to it.
///
/// A `Binding` may be shared by forking it (see [`Binding::fork`]); each fork has an
/// independent dispose lifetime, and the underlying session is only released once every fork
/// (including the original) has been disposed.
pub trait Binding: Send + Sync {
    /// Select a server matching `read_preference` and return a channel to it.
    fn select_server<'a>(
        &'a self,
        read_preference: Option<&'a ReadPreference>,
        cancellation: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Arc<dyn Channel>>>;

    /// The session behind this binding.
    fn session(&self) -> &dyn Session;

    /// Produce an independent reference to the same underlying session with its own dispose
    /// lifetime. Forks may be used concurrently even though a single `Binding` handle may not.
    fn fork(&self) -> Arc<dyn Binding>;

    /// Release this handle's share of the underlying session. The session itself is only
    /// released once every fork (including the original handle) has called `dispose`.
    fn dispose(&self);
}

/// The session state behind a [`Binding`], carrying the causal-consistency bookkeeping the
/// server expects a client to maintain across commands.
pub trait Session: Send + Sync {
    /// The most recent operation time reported by the server on any reply seen by this session,
    /// used both for causal consistency and to seed a change stream's
    /// `initial_operation_time`.
    fn operation_time(&self) -> Option<bson::Timestamp>;

    /// Record a new operation time observed from a server reply. Implementations must update
    /// monotonically: an earlier time than the one already recorded must be ignored.
    fn advance_operation_time(&self, time: bson::Timestamp);

    /// Whether the server behind this session is known to support retryable reads.
    fn supports_retryable_reads(&self) -> bool;
}
