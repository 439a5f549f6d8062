//! Copy plan and shell command construction.
//!
//! The plan is fixed and ordered: config, workspace, skills. All three are
//! chained with `&&` and followed by the marker write, so the marker only
//! changes when every copy exited cleanly.

use std::path::{Path, PathBuf};

use stowage_core::SyncConfig;

/// Transient files that must never poison the config mirror.
pub const CONFIG_EXCLUDES: &[&str] = &["*.lock", "*.log", "*.tmp"];

/// Skills (synced by their own step), regenerable data, caches and VCS metadata.
pub const WORKSPACE_EXCLUDES: &[&str] = &[
    "skills",
    "data",
    "logs",
    "__pycache__",
    ".coverage",
    "*.pyc",
    "jiti",
    ".git",
    "node-compile-cache",
];

/// Printed by a probe when the marker file exists.
pub const PROBE_FOUND: &str = "EXISTS";
pub const PROBE_MISSING: &str = "NOTFOUND";

/// One mirror-with-delete directory copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStep {
    pub name: &'static str,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub excludes: Vec<&'static str>,
}

impl SyncStep {
    /// `rsync -r --no-times --delete [--exclude=..] '<src>/' '<dst>/'`
    pub fn command(&self) -> String {
        let mut cmd = String::from("rsync -r --no-times --delete");
        for glob in &self.excludes {
            cmd.push_str(" --exclude=");
            cmd.push_str(&quote(glob));
        }
        cmd.push(' ');
        cmd.push_str(&quote_dir(&self.source));
        cmd.push(' ');
        cmd.push_str(&quote_dir(&self.destination));
        cmd
    }
}

/// The three copy steps plus the completion marker they gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    pub steps: Vec<SyncStep>,
    pub marker: PathBuf,
}

impl SyncPlan {
    /// Build the plan for a resolved config directory.
    pub fn for_source(config: &SyncConfig, source_dir: &Path) -> Self {
        let steps = vec![
            SyncStep {
                name: "config",
                source: source_dir.to_path_buf(),
                destination: config.remote_config_dir(),
                excludes: CONFIG_EXCLUDES.to_vec(),
            },
            SyncStep {
                name: "workspace",
                source: config.workspace_dir.clone(),
                destination: config.remote_workspace_dir(),
                excludes: WORKSPACE_EXCLUDES.to_vec(),
            },
            SyncStep {
                name: "skills",
                source: config.skills_dir(),
                destination: config.remote_skills_dir(),
                excludes: Vec::new(),
            },
        ];
        Self {
            steps,
            marker: config.marker_path(),
        }
    }

    /// The composite command: every step, then the marker write, joined by `&&`.
    pub fn command(&self) -> String {
        let mut parts: Vec<String> = self.steps.iter().map(SyncStep::command).collect();
        parts.push(format!("date -Iseconds > {}", quote_path(&self.marker)));
        parts.join(" && ")
    }
}

/// `[ -f '<path>' ] && echo EXISTS || echo NOTFOUND`
pub fn probe_command(path: &Path) -> String {
    format!(
        "[ -f {} ] && echo {PROBE_FOUND} || echo {PROBE_MISSING}",
        quote_path(path)
    )
}

pub fn marker_read_command(marker: &Path) -> String {
    format!("cat {}", quote_path(marker))
}

/// Single-quote `s` for `sh`, escaping embedded single quotes.
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn quote_path(path: &Path) -> String {
    quote(&path.to_string_lossy())
}

/// Quoted with exactly one trailing slash, so rsync copies contents.
fn quote_dir(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let trimmed = raw.trim_end_matches('/');
    quote(&format!("{trimmed}/"))
}
