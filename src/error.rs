//! Contains the `Error` and `Result` types used throughout this crate.

use std::{any::Any, collections::HashSet, fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const RETRYABLE_READ_CODES: [i32; 13] = [
    11600, 11602, 10107, 13435, 13436, 189, 91, 7, 6, 89, 9001, 134, 262,
];

/// Change-stream errors reported with one of these codes are never resumable, regardless of
/// whether they carry the `ResumableChangeStreamError` label.
const CHANGE_STREAM_FATAL_CODES: [i32; 6] = [
    11601,  // Interrupted
    136,    // CappedPositionLost
    237,    // CursorKilled
    20,     // IllegalOperation
    280,    // ChangeStreamFatalError
    286,    // ChangeStreamHistoryLost
];

pub(crate) const CURSOR_NOT_FOUND: i32 = 43;

/// Label attached to a change stream error indicating the server has asserted it can be safely
/// resumed, independent of the numeric error code.
pub const RESUMABLE_CHANGE_STREAM_ERROR: &str = "ResumableChangeStreamError";

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur in this crate. The inner [`ErrorKind`] is boxed to keep `Result<T>`
/// small on the stack and to allow adding new error variants without an API break.
#[derive(Clone, Debug, Error)]
#[error("{kind}")]
#[non_exhaustive]
pub struct Error {
    /// The type of error that occurred.
    pub kind: Box<ErrorKind>,
    labels: HashSet<String>,
    pub(crate) wire_version: Option<i32>,
    #[source]
    source: Option<Box<Error>>,
}

impl Error {
    /// Wrap an arbitrary value produced by caller code, e.g. from a [`Binding`](crate::binding::Binding)
    /// or [`Channel`](crate::channel::Channel) implementation.
    pub fn custom(e: impl Any + Send + Sync) -> Self {
        Self::new(ErrorKind::Custom(Arc::new(e)), None::<Option<String>>)
    }

    /// Retrieve the wrapped value from a [`custom`](Error::custom) error, if this error was
    /// constructed from one of type `E`.
    pub fn get_custom<E: Any>(&self) -> Option<&E> {
        match self.kind.as_ref() {
            ErrorKind::Custom(ref any) => any.downcast_ref(),
            _ => None,
        }
    }

    pub(crate) fn new(kind: ErrorKind, labels: Option<impl IntoIterator<Item = String>>) -> Self {
        Self {
            kind: Box::new(kind),
            labels: labels
                .map(|labels| labels.into_iter().collect())
                .unwrap_or_default(),
            wire_version: None,
            source: None,
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Error {
        ErrorKind::Internal {
            message: message.into(),
        }
        .into()
    }

    pub(crate) fn network_timeout() -> Error {
        std::io::Error::from(std::io::ErrorKind::TimedOut).into()
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Error {
        ErrorKind::InvalidArgument {
            message: message.into(),
        }
        .into()
    }

    /// A mutator was called on a [`FindBuilder`](crate::find_builder::FindBuilder) after it had
    /// already frozen.
    pub(crate) fn frozen() -> Error {
        ErrorKind::Frozen.into()
    }

    pub(crate) fn cursor_not_found(server: impl Into<String>, cursor_id: i64) -> Error {
        ErrorKind::CursorNotFound {
            server: server.into(),
            cursor_id,
        }
        .into()
    }

    pub(crate) fn kill_cursors_failure(server: impl Into<String>, cursor_id: i64) -> Error {
        ErrorKind::KillCursorsFailure {
            server: server.into(),
            cursor_id,
        }
        .into()
    }

    pub(crate) fn server_selection(message: impl Into<String>) -> Error {
        ErrorKind::ServerSelection {
            message: message.into(),
        }
        .into()
    }

    /// Whether this is a network-level error (as opposed to a server-reported command failure).
    pub(crate) fn is_network_error(&self) -> bool {
        matches!(self.kind.as_ref(), ErrorKind::Io(..))
    }

    /// Whether a read operation should be retried once if this error occurs.
    ///
    /// Network errors are always retryable; otherwise the server-reported code must appear
    /// in the retryable-read code list.
    pub(crate) fn is_read_retryable(&self) -> bool {
        if self.is_network_error() {
            return true;
        }
        match self.code() {
            Some(code) => RETRYABLE_READ_CODES.contains(&code),
            None => false,
        }
    }

    /// Whether an error encountered while iterating a change stream can be transparently
    /// resumed, per the resumability rules in the change streams specification: network errors
    /// are always resumable, and server errors are resumable unless they carry one of a small
    /// set of fatal codes.
    pub(crate) fn is_resumable(&self) -> bool {
        if !self.is_server_error() {
            return true;
        }
        if self.is_cursor_not_found() {
            return true;
        }
        match self.code() {
            Some(code) => !CHANGE_STREAM_FATAL_CODES.contains(&code),
            None => true,
        }
    }

    /// Whether an error originated from the server (as opposed to a transport/network failure
    /// or a local validation error).
    pub(crate) fn is_server_error(&self) -> bool {
        matches!(
            self.kind.as_ref(),
            ErrorKind::Command(_) | ErrorKind::CursorNotFound { .. }
        )
    }

    pub(crate) fn is_cursor_not_found(&self) -> bool {
        matches!(self.kind.as_ref(), ErrorKind::CursorNotFound { .. })
            || self.code() == Some(CURSOR_NOT_FOUND)
    }

    /// The labels attached to this error.
    pub fn labels(&self) -> &HashSet<String> {
        &self.labels
    }

    /// Whether this error contains the given label.
    pub fn contains_label<T: AsRef<str>>(&self, label: T) -> bool {
        self.labels().contains(label.as_ref())
    }

    pub(crate) fn add_label<T: AsRef<str>>(&mut self, label: T) {
        self.labels.insert(label.as_ref().to_string());
    }

    /// The server-reported numeric error code, if any, walking through wrapped sources.
    pub(crate) fn code(&self) -> Option<i32> {
        match self.kind.as_ref() {
            ErrorKind::Command(command_error) => Some(command_error.code),
            _ => None,
        }
        .or_else(|| self.source.as_ref().and_then(|s| s.code()))
    }

    pub(crate) fn with_source<E: Into<Option<Error>>>(mut self, source: E) -> Self {
        self.source = source.into().map(Box::new);
        self
    }

    pub(crate) fn with_wire_version(mut self, wire_version: impl Into<Option<i32>>) -> Self {
        self.wire_version = wire_version.into();
        self
    }
}

impl<E> From<E> for Error
where
    ErrorKind: From<E>,
{
    fn from(err: E) -> Self {
        Error::new(err.into(), None::<Option<String>>)
    }
}

impl From<bson::de::Error> for ErrorKind {
    fn from(err: bson::de::Error) -> Self {
        Self::BsonDeserialization(err)
    }
}

impl From<bson::ser::Error> for ErrorKind {
    fn from(err: bson::ser::Error) -> Self {
        Self::BsonSerialization(err)
    }
}

impl From<bson::raw::Error> for ErrorKind {
    fn from(err: bson::raw::Error) -> Self {
        Self::InvalidResponse {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ErrorKind {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<std::io::ErrorKind> for ErrorKind {
    fn from(err: std::io::ErrorKind) -> Self {
        Self::Io(Arc::new(err.into()))
    }
}

/// The types of errors that can occur.
#[allow(missing_docs)]
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An invalid argument was provided, e.g. a mutator called on a frozen
    /// [`FindBuilder`](crate::find_builder::FindBuilder).
    #[error("an invalid argument was provided: {message}")]
    #[non_exhaustive]
    InvalidArgument { message: String },

    /// The server returned an error to an attempted operation.
    #[error("command failed: {0}")]
    Command(CommandError),

    /// Wrapper around `bson::de::Error`.
    #[error("{0}")]
    BsonDeserialization(bson::de::Error),

    /// Wrapper around `bson::ser::Error`.
    #[error("{0}")]
    BsonSerialization(bson::ser::Error),

    /// Wrapper around [`std::io::Error`].
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    /// The server returned a reply that did not match the expected shape for the command.
    #[error("the server returned an invalid reply to a database operation: {message}")]
    #[non_exhaustive]
    InvalidResponse { message: String },

    /// A [`Binding`](crate::binding::Binding) could not select a server for the operation.
    #[error("{message}")]
    #[non_exhaustive]
    ServerSelection { message: String },

    /// An internal invariant was violated.
    #[error("internal error: {message}")]
    #[non_exhaustive]
    Internal { message: String },

    /// No resume token was available to resume a change stream after a resumable error.
    #[error("cannot resume a change stream with no available resume token")]
    MissingResumeToken,

    /// A mutator was called on a [`FindBuilder`](crate::find_builder::FindBuilder) that had
    /// already frozen, i.e. had already committed to an execution via `count`, `size`, `explain`,
    /// or `iterate`.
    #[error("this find builder is frozen and can no longer be modified")]
    Frozen,

    /// A `getMore` or `killCursors` targeted a cursor id the server no longer recognizes.
    #[error("cursor {cursor_id} not found on server {server}")]
    #[non_exhaustive]
    CursorNotFound { server: String, cursor_id: i64 },

    /// A best-effort `killCursors` issued from a [`BatchCursor`](crate::cursor::BatchCursor)'s
    /// close path failed to confirm the cursor was killed.
    #[error("failed to kill cursor {cursor_id} on server {server}")]
    #[non_exhaustive]
    KillCursorsFailure { server: String, cursor_id: i64 },

    /// A custom value produced by caller code, e.g. a [`Channel`](crate::channel::Channel)
    /// implementation.
    #[error("custom error")]
    Custom(Arc<dyn Any + Send + Sync>),
}

/// An error that occurred due to a database command failing.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub struct CommandError {
    /// Identifies the type of error.
    pub code: i32,

    /// The name associated with the error code.
    #[serde(rename = "codeName", default)]
    pub code_name: String,

    /// A description of the error that occurred.
    #[serde(rename = "errmsg", default = "String::new")]
    pub message: String,
}

impl fmt::Display for CommandError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "error code {} ({}): {}",
            self.code, self.code_name, self.message
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn command_error(code: i32) -> Error {
        ErrorKind::Command(CommandError {
            code,
            code_name: String::new(),
            message: "failed".into(),
        })
        .into()
    }

    #[test]
    fn network_errors_are_read_retryable() {
        let err: Error = std::io::Error::from(std::io::ErrorKind::ConnectionReset).into();
        assert!(err.is_read_retryable());
        assert!(err.is_network_error());
    }

    #[test]
    fn retryable_read_code_is_retryable() {
        assert!(command_error(11600).is_read_retryable());
        assert!(!command_error(1).is_read_retryable());
    }

    #[test]
    fn unrecognized_server_error_is_resumable_by_default() {
        assert!(command_error(1).is_resumable());
    }

    #[test]
    fn non_server_error_is_always_resumable() {
        let err: Error = std::io::Error::from(std::io::ErrorKind::ConnectionReset).into();
        assert!(err.is_resumable());
    }

    #[test]
    fn cursor_not_found_is_resumable() {
        assert!(Error::cursor_not_found("a:1", 7).is_resumable());
        assert!(command_error(CURSOR_NOT_FOUND).is_resumable());
    }

    #[test]
    fn change_stream_fatal_codes_are_not_resumable() {
        assert!(!command_error(280).is_resumable()); // ChangeStreamFatalError
        assert!(!command_error(286).is_resumable()); // ChangeStreamHistoryLost
        assert!(!command_error(237).is_resumable()); // CursorKilled
    }
}
