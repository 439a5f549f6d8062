//! Reconciliation entry point.
//!
//! credentials → mount → resolve layout → composite copy → read marker.
//! Every step is awaited in order; every failure becomes a [`SyncResult`].

use chrono::Utc;
use stowage_core::{StorageCredentials, SyncConfig, SyncFailure, SyncResult};

use crate::layout::{resolve_source, ResolveError};
use crate::mount::RemoteMount;
use crate::plan::{marker_read_command, SyncPlan};
use crate::sandbox::{run_captured, Sandbox, WaitOutcome};
use crate::verify::{failure_details, timeout_details, verify_marker};
use crate::SandboxError;

/// Mirror config, workspace and skills to the remote volume and verify.
///
/// Never returns an error: faults are folded into the result's `error` and
/// `details`. Concurrent callers against the same target must serialize
/// themselves.
pub async fn sync_to_remote<S, M>(
    sandbox: &S,
    mount: &M,
    config: &SyncConfig,
    credentials: &StorageCredentials,
) -> SyncResult
where
    S: Sandbox,
    M: RemoteMount,
{
    if !credentials.is_configured() {
        return fail(SyncFailure::NotConfigured, None);
    }

    if !mount.mount(config, credentials).await {
        return fail(SyncFailure::MountFailed, None);
    }
    tracing::info!("remote mounted at {}", config.mount_root.display());

    let layout = match resolve_source(sandbox, config).await {
        Ok(layout) => layout,
        Err(e @ ResolveError::NoConfigFound { .. }) => {
            return fail(SyncFailure::NoConfigFound, Some(e.to_string()))
        }
        Err(ResolveError::Probe(e)) => {
            return fail(SyncFailure::SourceVerificationFailed, Some(e.to_string()))
        }
    };
    let source_dir = &config.layout(layout).dir;
    tracing::info!("syncing from {layout} layout {}", source_dir.display());

    match copy_and_verify(sandbox, config, source_dir).await {
        Ok(result) => result,
        Err(e) => fail(SyncFailure::SyncError, Some(e.to_string())),
    }
}

async fn copy_and_verify<S: Sandbox>(
    sandbox: &S,
    config: &SyncConfig,
    source_dir: &std::path::Path,
) -> Result<SyncResult, SandboxError> {
    let started_at = Utc::now();
    let plan = SyncPlan::for_source(config, source_dir);
    let command = plan.command();
    tracing::debug!("sync command: {command}");

    let copy = sandbox.start_process(&command).await?;
    if sandbox.wait(&copy, config.sync_timeout()).await? == WaitOutcome::TimedOut {
        // Whatever marker is on the remote now was not written by this run.
        let logs = sandbox.get_logs(&copy).await?;
        let details = timeout_details(config.sync_timeout(), &logs.stdout, &logs.stderr);
        return Ok(fail(SyncFailure::SyncFailed, Some(details)));
    }

    let marker = run_captured(
        sandbox,
        &marker_read_command(&plan.marker),
        config.marker_read_timeout(),
    )
    .await?;
    if marker.outcome == WaitOutcome::TimedOut {
        let details = format!(
            "Timed out after {}s reading completion marker",
            config.marker_read_timeout().as_secs_f64()
        );
        return Ok(fail(SyncFailure::SyncFailed, Some(details)));
    }

    match verify_marker(&marker.logs.stdout, config.marker_policy, started_at) {
        Ok(last_sync) => {
            tracing::info!("sync complete, last_sync={last_sync}");
            Ok(SyncResult::succeeded(last_sync))
        }
        Err(rejection) => {
            let logs = sandbox.get_logs(&copy).await?;
            tracing::debug!("marker rejected: {rejection}");
            let details = failure_details(&logs.stdout, &logs.stderr, &rejection);
            Ok(fail(SyncFailure::SyncFailed, Some(details)))
        }
    }
}

fn fail(kind: SyncFailure, details: Option<String>) -> SyncResult {
    match details.as_deref() {
        Some(d) => tracing::warn!("{kind}: {d}"),
        None => tracing::warn!("{kind}"),
    }
    SyncResult::failed(kind, details)
}
