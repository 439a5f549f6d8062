//! Process-execution seam.
//!
//! The host sandbox runtime starts a shell command, lets the caller wait on it
//! with a deadline, and hands back captured output afterwards. Exit codes are
//! not part of the contract: callers re-derive success from observable state.
//! Whether the deadline passed is part of it.

use std::collections::HashMap;
use std::future::Future;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};

use crate::error::SandboxError;

/// Captured output of a finished (or timed-out) process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessLogs {
    pub stdout: String,
    pub stderr: String,
}

/// How a [`Sandbox::wait`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The process exited, with any status.
    Exited,
    /// The deadline passed first; the process was stopped.
    TimedOut,
}

/// A sandbox that can run shell commands.
pub trait Sandbox: Send + Sync {
    /// Opaque handle to a started process.
    type Process: Send + Sync;

    /// Begin executing `command` in the sandbox's shell.
    fn start_process(
        &self,
        command: &str,
    ) -> impl Future<Output = Result<Self::Process, SandboxError>> + Send;

    /// Block until the process exits or `timeout` elapses, whichever is first.
    ///
    /// A non-zero exit is reported as [`WaitOutcome::Exited`], not an error.
    fn wait(
        &self,
        process: &Self::Process,
        timeout: Duration,
    ) -> impl Future<Output = Result<WaitOutcome, SandboxError>> + Send;

    /// Output captured so far, including after a timeout.
    fn get_logs(
        &self,
        process: &Self::Process,
    ) -> impl Future<Output = Result<ProcessLogs, SandboxError>> + Send;
}

/// A command's wait outcome together with its logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    pub outcome: WaitOutcome,
    pub logs: ProcessLogs,
}

/// Start `command`, wait up to `timeout`, and return its logs.
pub async fn run_captured<S: Sandbox>(
    sandbox: &S,
    command: &str,
    timeout: Duration,
) -> Result<Captured, SandboxError> {
    let process = sandbox.start_process(command).await?;
    let outcome = sandbox.wait(&process, timeout).await?;
    let logs = sandbox.get_logs(&process).await?;
    Ok(Captured { outcome, logs })
}

// ---------------------------------------------------------------------------
// LocalSandbox
// ---------------------------------------------------------------------------

/// Output still in flight after a kill is collected for at most this long.
const KILL_DRAIN: Duration = Duration::from_millis(250);

type Buffer = Arc<StdMutex<Vec<u8>>>;

/// Handle returned by [`LocalSandbox::start_process`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalProcess(u64);

struct Slot {
    stdout: Buffer,
    stderr: Buffer,
    state: State,
}

enum State {
    Running {
        done: oneshot::Receiver<std::io::Result<ExitStatus>>,
        kill: oneshot::Sender<()>,
        readers: Vec<JoinHandle<()>>,
        group: Option<u32>,
    },
    Finished(WaitOutcome),
}

impl Slot {
    fn logs(&self) -> ProcessLogs {
        ProcessLogs {
            stdout: snapshot(&self.stdout),
            stderr: snapshot(&self.stderr),
        }
    }
}

/// Runs commands with `sh -c` on the local host.
///
/// Each command gets its own process group. When a wait deadline passes the
/// whole group is killed, so nothing the command spawned keeps running, and
/// the output printed up to that point stays available.
#[derive(Default)]
pub struct LocalSandbox {
    next_id: AtomicU64,
    envs: Vec<(String, String)>,
    slots: Mutex<HashMap<u64, Slot>>,
}

impl LocalSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an environment variable for every command this sandbox starts.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

impl Sandbox for LocalSandbox {
    type Process = LocalProcess;

    async fn start_process(&self, command: &str) -> Result<LocalProcess, SandboxError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| SandboxError::Spawn {
            command: command.to_string(),
            source,
        })?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let group = child.id();
        let stdout = Buffer::default();
        let stderr = Buffer::default();
        let mut readers = Vec::with_capacity(2);
        if let Some(pipe) = child.stdout.take() {
            readers.push(capture(pipe, stdout.clone()));
        }
        if let Some(pipe) = child.stderr.take() {
            readers.push(capture(pipe, stderr.clone()));
        }

        let (done_tx, done_rx) = oneshot::channel();
        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        // Returning without a status drops the child, which kills it.
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    let _ = done_tx.send(status);
                }
                _ = kill_rx => {}
            }
        });

        tracing::debug!("started process {id}: {command}");
        self.slots.lock().await.insert(
            id,
            Slot {
                stdout,
                stderr,
                state: State::Running {
                    done: done_rx,
                    kill: kill_tx,
                    readers,
                    group,
                },
            },
        );
        Ok(LocalProcess(id))
    }

    async fn wait(
        &self,
        process: &LocalProcess,
        timeout: Duration,
    ) -> Result<WaitOutcome, SandboxError> {
        let id = process.0;
        let deadline = Instant::now() + timeout;
        let mut slot = self
            .slots
            .lock()
            .await
            .remove(&id)
            .ok_or(SandboxError::UnknownProcess(id))?;

        let state = std::mem::replace(&mut slot.state, State::Finished(WaitOutcome::Exited));
        let result = match state {
            State::Finished(outcome) => Ok(outcome),
            State::Running {
                mut done,
                kill,
                readers,
                group,
            } => match timeout_at(deadline, &mut done).await {
                Ok(Ok(Ok(_status))) => {
                    drain(readers, deadline).await;
                    Ok(WaitOutcome::Exited)
                }
                Ok(Ok(Err(source))) => Err(SandboxError::Output { id, source }),
                Ok(Err(_)) => Err(SandboxError::Transport(format!(
                    "process {id} vanished before reporting its status"
                ))),
                Err(_) => {
                    tracing::warn!("process {id} exceeded {timeout:?}; killing its group");
                    if let Some(pgid) = group {
                        kill_group(pgid);
                    }
                    let _ = kill.send(());
                    drain(readers, Instant::now() + KILL_DRAIN).await;
                    Ok(WaitOutcome::TimedOut)
                }
            },
        };

        if let Ok(outcome) = &result {
            slot.state = State::Finished(*outcome);
        }
        self.slots.lock().await.insert(id, slot);
        result
    }

    async fn get_logs(&self, process: &LocalProcess) -> Result<ProcessLogs, SandboxError> {
        self.slots
            .lock()
            .await
            .get(&process.0)
            .map(Slot::logs)
            .ok_or(SandboxError::UnknownProcess(process.0))
    }
}

fn capture<R>(mut pipe: R, buffer: Buffer) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 4096];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(&chunk[..n]);
                    }
                }
            }
        }
    })
}

/// Let pipe readers finish, but not past `until`.
async fn drain(readers: Vec<JoinHandle<()>>, until: Instant) {
    for reader in readers {
        if timeout_at(until, reader).await.is_err() {
            break;
        }
    }
}

fn snapshot(buffer: &Buffer) -> String {
    buffer
        .lock()
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pgid) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        tracing::debug!("killpg {pgid}: {e}");
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::quote;
    use tempfile::TempDir;

    #[tokio::test]
    async fn captures_stdout_and_stderr() {
        let sandbox = LocalSandbox::new();
        let run = run_captured(&sandbox, "echo out; echo err >&2", Duration::from_secs(5))
            .await
            .expect("run");
        assert_eq!(run.outcome, WaitOutcome::Exited);
        assert_eq!(run.logs.stdout, "out\n");
        assert_eq!(run.logs.stderr, "err\n");
    }

    #[tokio::test]
    async fn non_zero_exit_is_not_an_error() {
        let sandbox = LocalSandbox::new();
        let run = run_captured(&sandbox, "echo partial; exit 3", Duration::from_secs(5))
            .await
            .expect("non-zero exit must still yield logs");
        assert_eq!(run.outcome, WaitOutcome::Exited);
        assert_eq!(run.logs.stdout, "partial\n");
    }

    #[tokio::test]
    async fn timeout_is_reported_and_keeps_partial_output() {
        let sandbox = LocalSandbox::new();
        let started = std::time::Instant::now();
        let run = run_captured(
            &sandbox,
            "echo 'rsync: error' >&2; echo halfway; sleep 5",
            Duration::from_millis(300),
        )
        .await
        .expect("timeout is not an error");
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(run.outcome, WaitOutcome::TimedOut);
        assert_eq!(run.logs.stderr, "rsync: error\n");
        assert_eq!(run.logs.stdout, "halfway\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_commands_spawned_by_the_shell() {
        let tmp = TempDir::new().unwrap();
        let late = tmp.path().join("late");
        let command = format!("sleep 1; touch {}", quote(&late.to_string_lossy()));

        let sandbox = LocalSandbox::new();
        let run = run_captured(&sandbox, &command, Duration::from_millis(200))
            .await
            .expect("run");
        assert_eq!(run.outcome, WaitOutcome::TimedOut);

        tokio::time::sleep(Duration::from_millis(1800)).await;
        assert!(!late.exists(), "command kept running after its deadline");
    }

    #[tokio::test]
    async fn env_is_passed_to_commands() {
        let sandbox = LocalSandbox::new().env("STOWAGE_GREETING", "hi");
        let run = run_captured(&sandbox, "echo \"$STOWAGE_GREETING\"", Duration::from_secs(5))
            .await
            .expect("run");
        assert_eq!(run.logs.stdout, "hi\n");
    }

    #[tokio::test]
    async fn logs_of_unknown_handle_is_an_error() {
        let sandbox = LocalSandbox::new();
        let err = sandbox.get_logs(&LocalProcess(99)).await.unwrap_err();
        assert!(matches!(err, SandboxError::UnknownProcess(99)));
    }

    #[tokio::test]
    async fn waiting_twice_keeps_outcome_and_logs() {
        let sandbox = LocalSandbox::new();
        let p = sandbox.start_process("echo once").await.expect("start");
        let first = sandbox.wait(&p, Duration::from_secs(5)).await.expect("wait");
        let second = sandbox.wait(&p, Duration::from_secs(5)).await.expect("wait again");
        assert_eq!((first, second), (WaitOutcome::Exited, WaitOutcome::Exited));
        let logs = sandbox.get_logs(&p).await.expect("logs");
        assert_eq!(logs.stdout, "once\n");
    }
}
