//! Source layout resolution.
//!
//! Probes the current layout's marker first and stops there if it exists;
//! only then is the legacy marker probed. When neither exists the sync must
//! not run, otherwise an empty source would be mirrored over a good backup.

use stowage_core::{SourceLayout, SyncConfig};
use thiserror::Error;

use crate::plan::{probe_command, PROBE_FOUND};
use crate::sandbox::{run_captured, Sandbox, WaitOutcome};
use crate::SandboxError;

/// Why no source layout could be selected.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Both probes ran and neither marker exists.
    #[error(
        "Neither openclaw.json nor clawdbot.json found. New check: {}, Legacy check: {}",
        or_empty(.current_probe),
        or_empty(.legacy_probe)
    )]
    NoConfigFound {
        current_probe: String,
        legacy_probe: String,
    },

    /// A probe could not be issued or its output not retrieved.
    #[error("{0}")]
    Probe(#[from] SandboxError),
}

fn or_empty(s: &str) -> &str {
    if s.is_empty() {
        "(empty)"
    } else {
        s
    }
}

/// Pick the authoritative config layout.
///
/// A probe that times out counts as "not found", whatever it printed.
pub async fn resolve_source<S: Sandbox>(
    sandbox: &S,
    config: &SyncConfig,
) -> Result<SourceLayout, ResolveError> {
    let (found, current) = probe(sandbox, config, SourceLayout::Current).await?;
    if found {
        return Ok(SourceLayout::Current);
    }

    let (found, legacy) = probe(sandbox, config, SourceLayout::Legacy).await?;
    if found {
        tracing::info!("using legacy config layout at {}", config.legacy.dir.display());
        return Ok(SourceLayout::Legacy);
    }

    Err(ResolveError::NoConfigFound {
        current_probe: current,
        legacy_probe: legacy,
    })
}

/// Whether `layout`'s marker exists, plus the probe's raw stdout.
async fn probe<S: Sandbox>(
    sandbox: &S,
    config: &SyncConfig,
    layout: SourceLayout,
) -> Result<(bool, String), SandboxError> {
    let marker = &config.layout(layout).marker;
    let run = run_captured(sandbox, &probe_command(marker), config.probe_timeout()).await?;
    let stdout = run.logs.stdout;
    tracing::debug!(
        "{layout} layout probe for {}: {:?} ({:?})",
        marker.display(),
        stdout.trim(),
        run.outcome
    );
    let found = run.outcome == WaitOutcome::Exited && stdout.contains(PROBE_FOUND);
    Ok((found, stdout))
}
