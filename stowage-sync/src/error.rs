//! Error types for stowage-sync.

use thiserror::Error;

/// Faults raised by a [`Sandbox`](crate::Sandbox) while running a command.
///
/// A command that runs and exits non-zero is *not* an error here; only
/// failures to start, track, or talk to the process are.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The process could not be started.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Collecting the output of a started process failed.
    #[error("failed to collect output of process {id}: {source}")]
    Output {
        id: u64,
        #[source]
        source: std::io::Error,
    },

    /// The handle does not refer to a process this sandbox started.
    #[error("unknown process handle {0}")]
    UnknownProcess(u64),

    /// The sandbox runtime itself is unreachable or returned garbage.
    #[error("sandbox transport error: {0}")]
    Transport(String),
}
