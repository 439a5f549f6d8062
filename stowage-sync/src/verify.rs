//! Completion marker verification.
//!
//! Success is read off the marker file, never off an exit status.

use std::time::Duration;

use chrono::{DateTime, Utc};
use stowage_core::{MarkerPolicy, SyncTimestamp};
use thiserror::Error;

/// Fallback diagnostic when the copy produced no output at all.
pub const NO_MARKER_DETAILS: &str = "No timestamp file created";

/// Why a marker's content was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkerRejection {
    #[error("completion marker is empty or missing")]
    Empty,

    #[error("completion marker is malformed: {0:?}")]
    Malformed(String),

    #[error("completion marker {marker} predates this sync (started {started})")]
    Stale { marker: String, started: String },
}

/// Validate raw marker content and return its trimmed value.
///
/// The shape check requires non-empty text starting with `YYYY-MM-DD`.
///
/// Under [`MarkerPolicy::Fresh`] the marker must also be an RFC 3339
/// timestamp no earlier than `started_at` at second precision.
pub fn verify_marker(
    raw: &str,
    policy: MarkerPolicy,
    started_at: DateTime<Utc>,
) -> Result<SyncTimestamp, MarkerRejection> {
    let marker = raw.trim();
    if marker.is_empty() {
        return Err(MarkerRejection::Empty);
    }
    let stamp =
        SyncTimestamp::parse(marker).ok_or_else(|| MarkerRejection::Malformed(marker.to_string()))?;

    if policy == MarkerPolicy::Fresh {
        let written = DateTime::parse_from_rfc3339(marker)
            .map_err(|_| MarkerRejection::Malformed(marker.to_string()))?;
        if written.timestamp() < started_at.timestamp() {
            return Err(MarkerRejection::Stale {
                marker: marker.to_string(),
                started: started_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
            });
        }
    }

    Ok(stamp)
}

/// Most specific diagnostic for a failed sync: stderr, then stdout, then
/// the rejection itself.
pub fn failure_details(stdout: &str, stderr: &str, rejection: &MarkerRejection) -> String {
    if !stderr.is_empty() {
        stderr.to_string()
    } else if !stdout.is_empty() {
        stdout.to_string()
    } else {
        match rejection {
            MarkerRejection::Stale { .. } => rejection.to_string(),
            _ => NO_MARKER_DETAILS.to_string(),
        }
    }
}

/// Diagnostic for a copy that outlived its deadline, with whatever it had
/// printed by then.
pub fn timeout_details(timeout: Duration, stdout: &str, stderr: &str) -> String {
    let message = format!("Sync timed out after {}s", timeout.as_secs_f64());
    let output = if !stderr.is_empty() { stderr } else { stdout };
    if output.is_empty() {
        message
    } else {
        format!("{message}: {output}")
    }
}
