//! Wraps a command in an `explain`.

use bson::{doc, Document};

/// The explain verbosity level, mirroring the server's `verbosity` command option.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Verbosity {
    /// `queryPlanner` — returns the winning plan without executing it.
    QueryPlanner,

    /// `allPlansExecution` — executes the command and reports full execution statistics.
    AllPlansExecution,
}

impl Verbosity {
    fn as_str(self) -> &'static str {
        match self {
            Verbosity::QueryPlanner => "queryPlanner",
            Verbosity::AllPlansExecution => "allPlansExecution",
        }
    }
}

/// Wrap `command` in an `explain` at the given verbosity.
pub(crate) fn build(command: Document, verbosity: Verbosity) -> Document {
    doc! {
        "explain": command,
        "verbosity": verbosity.as_str(),
    }
}
