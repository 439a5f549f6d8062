//! # stowage-sync
//!
//! Reconciles sandbox-local state with a mounted remote volume.
//!
//! Call [`sync_to_remote`] with a [`Sandbox`], a [`RemoteMount`], the
//! [`SyncConfig`](stowage_core::SyncConfig) and credentials. It resolves the
//! authoritative config layout, mirrors config, workspace and skills in one
//! composite command, then trusts only the completion marker it reads back.

pub mod error;
pub mod layout;
pub mod mount;
pub mod pipeline;
pub mod plan;
pub mod sandbox;
pub mod verify;

pub use error::SandboxError;
pub use layout::{resolve_source, ResolveError};
pub use mount::{DirectoryMount, RemoteMount};
pub use pipeline::sync_to_remote;
pub use plan::{SyncPlan, SyncStep};
pub use sandbox::{run_captured, Captured, LocalSandbox, ProcessLogs, Sandbox, WaitOutcome};
pub use verify::{timeout_details, verify_marker, MarkerRejection};
