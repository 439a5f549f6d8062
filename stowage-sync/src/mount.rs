//! Remote volume mount seam.

use std::future::Future;

use stowage_core::{StorageCredentials, SyncConfig};

/// Ensures the durable backend is reachable at `config.mount_root`.
///
/// Must be idempotent: mounting an already-mounted target returns `true`.
pub trait RemoteMount: Send + Sync {
    fn mount(
        &self,
        config: &SyncConfig,
        credentials: &StorageCredentials,
    ) -> impl Future<Output = bool> + Send;
}

/// Treats `mount_root` as an already-mounted local directory, creating it if
/// needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryMount;

impl RemoteMount for DirectoryMount {
    async fn mount(&self, config: &SyncConfig, _credentials: &StorageCredentials) -> bool {
        let root = &config.mount_root;
        match tokio::fs::create_dir_all(root).await {
            Ok(()) => {
                tracing::debug!("mount root ready: {}", root.display());
                true
            }
            Err(e) => {
                tracing::warn!("cannot prepare mount root {}: {e}", root.display());
                false
            }
        }
    }
}
