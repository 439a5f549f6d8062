//! Stowage core library — result types, credentials, configuration.
//!
//! - [`types`] — [`SyncResult`], [`SyncFailure`], [`SyncTimestamp`], [`SourceLayout`], [`StorageCredentials`]
//! - [`config`] — [`SyncConfig`] and its YAML loader
//! - [`error`] — [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{LayoutPaths, MarkerPolicy, SyncConfig};
pub use error::ConfigError;
pub use types::{SourceLayout, StorageCredentials, SyncFailure, SyncResult, SyncTimestamp};
