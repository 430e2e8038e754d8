//! The identity of the server a [`Binding`](crate::binding::Binding) has selected for an
//! operation.

use std::fmt;

/// The address of a server a command was (or should be) executed against.
///
/// Connection establishment, DNS resolution and topology discovery are owned by the
/// [`Binding`](crate::binding::Binding) implementation; this type only carries enough identity
/// to label log output and to compare "did this resume target the same server" in tests.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub struct ServerAddress {
    /// The hostname or IP address where the server can be found.
    pub host: String,

    /// The TCP port the server is listening on, defaulting to 27017 if unset.
    pub port: Option<u16>,
}

impl ServerAddress {
    /// Construct an address from a host and optional port.
    pub fn new(host: impl Into<String>, port: impl Into<Option<u16>>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
        }
    }

    pub(crate) fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(27017)
    }
}

impl Default for ServerAddress {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: None,
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}:{}", self.host, self.port_or_default())
    }
}
