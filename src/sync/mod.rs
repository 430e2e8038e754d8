//! Blocking wrappers around the async cursor and change stream types, running on a dedicated
//! background `tokio` runtime. Only available when the `sync` feature is enabled.

mod change_stream;
mod cursor;

pub use change_stream::ChangeStreamCursor;
pub use cursor::Cursor;

use once_cell::sync::Lazy;

pub(crate) static RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to start the blocking sync tokio runtime")
});
