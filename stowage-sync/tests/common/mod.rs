//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use stowage_core::{StorageCredentials, SyncConfig};
use stowage_sync::{ProcessLogs, RemoteMount, Sandbox, SandboxError, WaitOutcome};

/// What the composite copy command does when issued.
#[derive(Debug, Clone)]
pub enum CopyOutcome {
    /// All steps succeed; the marker gets the current time.
    WritesMarker,
    /// All steps succeed; the marker gets exactly this text.
    WritesMarkerText(String),
    /// A step fails; the marker is left as it was.
    FailsPartway { stdout: String, stderr: String },
}

/// A sandbox that answers probes, copies and marker reads from a script and
/// records every command it is asked to start.
///
/// Commands matching `time_out_commands_containing` never finish: `wait`
/// reports a timeout, a copy leaves the marker alone, and the logs hold only
/// what the command printed before stalling.
pub struct ScriptedSandbox {
    config: SyncConfig,
    pub current_exists: bool,
    pub legacy_exists: bool,
    pub copy: CopyOutcome,
    pub fail_commands_containing: Option<&'static str>,
    pub time_out_commands_containing: Option<&'static str>,
    marker: Mutex<Option<String>>,
    issued: Mutex<Vec<String>>,
    runs: Mutex<Vec<(ProcessLogs, WaitOutcome)>>,
}

impl ScriptedSandbox {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            config: config.clone(),
            current_exists: true,
            legacy_exists: false,
            copy: CopyOutcome::WritesMarker,
            fail_commands_containing: None,
            time_out_commands_containing: None,
            marker: Mutex::new(None),
            issued: Mutex::new(Vec::new()),
            runs: Mutex::new(Vec::new()),
        }
    }

    pub fn with_marker(self, text: &str) -> Self {
        *self.marker.lock().unwrap() = Some(text.to_string());
        self
    }

    pub fn issued(&self) -> Vec<String> {
        self.issued.lock().unwrap().clone()
    }

    pub fn issued_matching(&self, prefix: &str) -> Vec<String> {
        self.issued()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn marker(&self) -> Option<String> {
        self.marker.lock().unwrap().clone()
    }

    fn stalled(&self, command: &str) -> ProcessLogs {
        if !command.starts_with("rsync") {
            return self.answer(command);
        }
        match &self.copy {
            CopyOutcome::FailsPartway { stdout, stderr } => ProcessLogs {
                stdout: stdout.clone(),
                stderr: stderr.clone(),
            },
            _ => ProcessLogs::default(),
        }
    }

    fn answer(&self, command: &str) -> ProcessLogs {
        if command.starts_with("[ -f") {
            let current = self.config.current.marker.to_string_lossy().into_owned();
            let exists = if command.contains(&current) {
                self.current_exists
            } else {
                self.legacy_exists
            };
            let stdout = if exists { "EXISTS\n" } else { "NOTFOUND\n" };
            return ProcessLogs {
                stdout: stdout.to_string(),
                stderr: String::new(),
            };
        }

        if command.starts_with("rsync") {
            let mut marker = self.marker.lock().unwrap();
            return match &self.copy {
                CopyOutcome::WritesMarker => {
                    *marker = Some(format!(
                        "{}\n",
                        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false)
                    ));
                    ProcessLogs::default()
                }
                CopyOutcome::WritesMarkerText(text) => {
                    *marker = Some(format!("{text}\n"));
                    ProcessLogs::default()
                }
                CopyOutcome::FailsPartway { stdout, stderr } => ProcessLogs {
                    stdout: stdout.clone(),
                    stderr: stderr.clone(),
                },
            };
        }

        if command.starts_with("cat") {
            return match self.marker() {
                Some(text) => ProcessLogs {
                    stdout: text,
                    stderr: String::new(),
                },
                None => ProcessLogs {
                    stdout: String::new(),
                    stderr: "cat: .last-sync: No such file or directory\n".to_string(),
                },
            };
        }

        ProcessLogs::default()
    }
}

impl Sandbox for ScriptedSandbox {
    type Process = usize;

    async fn start_process(&self, command: &str) -> Result<usize, SandboxError> {
        self.issued.lock().unwrap().push(command.to_string());
        if let Some(needle) = self.fail_commands_containing {
            if command.contains(needle) {
                return Err(SandboxError::Transport("sandbox unreachable".to_string()));
            }
        }
        let stalls = self
            .time_out_commands_containing
            .is_some_and(|needle| command.contains(needle));
        let run = if stalls {
            (self.stalled(command), WaitOutcome::TimedOut)
        } else {
            (self.answer(command), WaitOutcome::Exited)
        };
        let mut runs = self.runs.lock().unwrap();
        runs.push(run);
        Ok(runs.len() - 1)
    }

    async fn wait(&self, process: &usize, _timeout: Duration) -> Result<WaitOutcome, SandboxError> {
        self.runs
            .lock()
            .unwrap()
            .get(*process)
            .map(|(_, outcome)| *outcome)
            .ok_or(SandboxError::UnknownProcess(*process as u64))
    }

    async fn get_logs(&self, process: &usize) -> Result<ProcessLogs, SandboxError> {
        self.runs
            .lock()
            .unwrap()
            .get(*process)
            .map(|(logs, _)| logs.clone())
            .ok_or(SandboxError::UnknownProcess(*process as u64))
    }
}

/// A mount that always answers `ok` and counts how often it was asked.
pub struct FixedMount {
    pub ok: bool,
    calls: AtomicUsize,
}

impl FixedMount {
    pub fn new(ok: bool) -> Self {
        Self {
            ok,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RemoteMount for FixedMount {
    async fn mount(&self, _config: &SyncConfig, _credentials: &StorageCredentials) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.ok
    }
}

pub fn credentials() -> StorageCredentials {
    StorageCredentials {
        access_key_id: Some("ak".to_string()),
        secret_access_key: Some("sk".to_string()),
        account_id: Some("acct".to_string()),
    }
}
