//! Sync configuration: every path and timeout the reconciliation relies on.
//!
//! # Storage layout
//!
//! ```text
//! ~/.stowage/
//!   config.yaml   (optional — any field omitted falls back to its default)
//! ```
//!
//! # API pattern
//!
//! - `load_at(home: &Path)` — explicit home; used in tests with `TempDir`
//! - `load()` — derives home from `dirs::home_dir()`, delegates to `load_at`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::types::SourceLayout;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A candidate config directory and the file whose presence proves it is live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutPaths {
    pub dir: PathBuf,
    pub marker: PathBuf,
}

/// How strictly the completion marker is checked after a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarkerPolicy {
    /// Non-empty and starts with `YYYY-MM-DD`.
    #[default]
    Shape,
    /// As `Shape`, and the timestamp is not older than the invocation start.
    Fresh,
}

/// Paths and timeouts for one reconciliation target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub current: LayoutPaths,
    pub legacy: LayoutPaths,
    pub workspace_dir: PathBuf,
    pub mount_root: PathBuf,
    pub remote_config_subdir: String,
    pub remote_workspace_subdir: String,
    pub remote_skills_subdir: String,
    pub marker_file: String,
    pub probe_timeout_ms: u64,
    pub sync_timeout_ms: u64,
    pub marker_read_timeout_ms: u64,
    pub marker_policy: MarkerPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            current: LayoutPaths {
                dir: PathBuf::from("/root/.openclaw"),
                marker: PathBuf::from("/root/.openclaw/openclaw.json"),
            },
            legacy: LayoutPaths {
                dir: PathBuf::from("/root/.clawdbot"),
                marker: PathBuf::from("/root/.clawdbot/clawdbot.json"),
            },
            workspace_dir: PathBuf::from("/root/clawd"),
            mount_root: PathBuf::from("/data/moltbot"),
            remote_config_subdir: "openclaw".to_string(),
            remote_workspace_subdir: "workspace".to_string(),
            remote_skills_subdir: "skills".to_string(),
            marker_file: ".last-sync".to_string(),
            probe_timeout_ms: 5_000,
            sync_timeout_ms: 120_000,
            marker_read_timeout_ms: 5_000,
            marker_policy: MarkerPolicy::Shape,
        }
    }
}

impl SyncConfig {
    /// A config whose local and remote trees all live under `root`.
    ///
    /// `<root>/.openclaw`, `<root>/.clawdbot`, `<root>/clawd`, `<root>/remote`.
    pub fn rooted_at(root: &Path) -> Self {
        let current = root.join(".openclaw");
        let legacy = root.join(".clawdbot");
        Self {
            current: LayoutPaths {
                marker: current.join("openclaw.json"),
                dir: current,
            },
            legacy: LayoutPaths {
                marker: legacy.join("clawdbot.json"),
                dir: legacy,
            },
            workspace_dir: root.join("clawd"),
            mount_root: root.join("remote"),
            ..Self::default()
        }
    }

    pub fn layout(&self, layout: SourceLayout) -> &LayoutPaths {
        match layout {
            SourceLayout::Current => &self.current,
            SourceLayout::Legacy => &self.legacy,
        }
    }

    pub fn skills_dir(&self) -> PathBuf {
        self.workspace_dir.join("skills")
    }

    pub fn remote_config_dir(&self) -> PathBuf {
        self.mount_root.join(&self.remote_config_subdir)
    }

    pub fn remote_workspace_dir(&self) -> PathBuf {
        self.mount_root.join(&self.remote_workspace_subdir)
    }

    pub fn remote_skills_dir(&self) -> PathBuf {
        self.mount_root.join(&self.remote_skills_subdir)
    }

    /// Completion marker, directly under the mount root.
    pub fn marker_path(&self) -> PathBuf {
        self.mount_root.join(&self.marker_file)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }

    pub fn marker_read_timeout(&self) -> Duration {
        Duration::from_millis(self.marker_read_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// `<home>/.stowage/config.yaml` — pure, no I/O.
pub fn path_at(home: &Path) -> PathBuf {
    home.join(".stowage").join("config.yaml")
}

/// Load the config under `home`, or defaults when no file exists.
pub fn load_at(home: &Path) -> Result<SyncConfig, ConfigError> {
    let path = path_at(home);
    if !path.exists() {
        return Ok(SyncConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(SyncConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<SyncConfig, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    load_at(&home)
}
