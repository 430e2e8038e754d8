//! A result-streaming core for a MongoDB-style database driver: batched server cursors, a
//! freezing find-builder façade, and a resumable change-stream cursor.
//!
//! This crate does not own a connection pool, topology description, or server-selection logic —
//! those are the caller's responsibility, modeled by the [`binding::Binding`] and
//! [`channel::Channel`] traits. What it owns is the protocol-level state machinery built on top of
//! whatever channel a caller hands it: truncating a `find`/`aggregate` cursor to a client-side
//! limit, freezing a mutable find specification once it commits to an execution, and resuming a
//! change stream transparently across the server errors the change streams specification says are
//! safe to resume across.
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::cast_possible_truncation)]
#![warn(clippy::cast_possible_wrap)]

pub use ::bson;

pub(crate) mod aggregate_op;
pub mod binding;
pub mod change_stream;
pub mod channel;
mod collation;
mod concern;
pub mod cursor;
pub mod error;
pub mod find_builder;
#[cfg(test)]
pub(crate) mod mock;
mod namespace;
mod operation;
pub(crate) mod results;
pub(crate) mod runtime;
pub mod retryable;
mod selection_criteria;
mod serde_util;
pub mod server_address;
#[cfg(feature = "sync")]
pub mod sync;

pub mod options;

pub use crate::{find_builder::FindBuilder, namespace::Namespace};

/// A boxed future, used throughout the [`binding::Binding`] and [`channel::Channel`] traits in
/// place of `async fn` in a trait, since both need to be object-safe.
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
