//! Domain types for a single reconciliation attempt.
//!
//! A [`SyncResult`] can only be built through [`SyncResult::succeeded`] or
//! [`SyncResult::failed`]. Success takes a [`SyncTimestamp`], which can only
//! be obtained from text starting with `YYYY-MM-DD`, so `success == true`
//! always carries a well-formed `lastSync` and a failure never does.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Serialize, Serializer};

static DATE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("static date-prefix pattern"));

// ---------------------------------------------------------------------------
// Failure taxonomy
// ---------------------------------------------------------------------------

/// Why a reconciliation attempt did not produce a verified backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncFailure {
    /// Remote storage credentials are absent; nothing remote was touched.
    NotConfigured,
    /// The remote volume could not be mounted; no copy was attempted.
    MountFailed,
    /// Probing for the source layout faulted (distinct from "not found").
    SourceVerificationFailed,
    /// Neither known source layout exists.
    NoConfigFound,
    /// The copy ran (or timed out) and no valid completion marker was observed.
    SyncFailed,
    /// Issuing or awaiting the copy command itself faulted.
    SyncError,
}

impl SyncFailure {
    pub const ALL: [SyncFailure; 6] = [
        SyncFailure::NotConfigured,
        SyncFailure::MountFailed,
        SyncFailure::SourceVerificationFailed,
        SyncFailure::NoConfigFound,
        SyncFailure::SyncFailed,
        SyncFailure::SyncError,
    ];

    /// Short machine-facing label carried in [`SyncResult`]'s `error` field.
    pub fn label(self) -> &'static str {
        match self {
            SyncFailure::NotConfigured => "R2 storage is not configured",
            SyncFailure::MountFailed => "Failed to mount R2 storage",
            SyncFailure::SourceVerificationFailed => "Failed to verify source files",
            SyncFailure::NoConfigFound => "Sync aborted: no config file found",
            SyncFailure::SyncFailed => "Sync failed",
            SyncFailure::SyncError => "Sync error",
        }
    }
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for SyncFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// SyncTimestamp
// ---------------------------------------------------------------------------

/// Trimmed completion-marker text that starts with `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SyncTimestamp(String);

impl SyncTimestamp {
    /// Trim `raw` and accept it only if it starts with a date prefix.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        DATE_PREFIX
            .is_match(trimmed)
            .then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SyncTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// SyncResult
// ---------------------------------------------------------------------------

/// Outcome of one reconciliation attempt, serialized for HTTP callers as
/// `{"success": .., "lastSync": .., "error": .., "details": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_sync: Option<SyncTimestamp>,
    #[serde(rename = "error", skip_serializing_if = "Option::is_none")]
    failure: Option<SyncFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl SyncResult {
    /// A verified sync whose completion marker read back as `last_sync`.
    pub fn succeeded(last_sync: SyncTimestamp) -> Self {
        Self {
            success: true,
            last_sync: Some(last_sync),
            failure: None,
            details: None,
        }
    }

    /// A failed attempt with an optional diagnostic.
    pub fn failed(kind: SyncFailure, details: Option<String>) -> Self {
        Self {
            success: false,
            last_sync: None,
            failure: Some(kind),
            details,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn last_sync(&self) -> Option<&str> {
        self.last_sync.as_ref().map(SyncTimestamp::as_str)
    }

    /// The failure kind's label.
    pub fn error(&self) -> Option<&str> {
        self.failure.map(SyncFailure::label)
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// The failure kind, or `None` for a successful result.
    pub fn failure(&self) -> Option<SyncFailure> {
        self.failure
    }
}

// ---------------------------------------------------------------------------
// Source layout
// ---------------------------------------------------------------------------

/// Which on-disk configuration directory convention is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceLayout {
    Current,
    Legacy,
}

impl fmt::Display for SourceLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLayout::Current => write!(f, "current"),
            SourceLayout::Legacy => write!(f, "legacy"),
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

pub const ACCESS_KEY_ENV: &str = "R2_ACCESS_KEY_ID";
pub const SECRET_KEY_ENV: &str = "R2_SECRET_ACCESS_KEY";
pub const ACCOUNT_ID_ENV: &str = "CF_ACCOUNT_ID";

/// Remote object-storage credentials. Empty strings count as absent.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StorageCredentials {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub account_id: Option<String>,
}

impl StorageCredentials {
    /// Read the three credential values from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build credentials from an arbitrary key lookup (environment, secret store, map).
    pub fn from_lookup(mut lookup: impl FnMut(&str) -> Option<String>) -> Self {
        Self {
            access_key_id: lookup(ACCESS_KEY_ENV),
            secret_access_key: lookup(SECRET_KEY_ENV),
            account_id: lookup(ACCOUNT_ID_ENV),
        }
    }

    /// True only when all three values are present and non-empty.
    pub fn is_configured(&self) -> bool {
        [&self.access_key_id, &self.secret_access_key, &self.account_id]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.is_empty()))
    }
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn mask(v: &Option<String>) -> &'static str {
            match v.as_deref() {
                Some(s) if !s.is_empty() => "<set>",
                _ => "<unset>",
            }
        }
        f.debug_struct("StorageCredentials")
            .field("access_key_id", &mask(&self.access_key_id))
            .field("secret_access_key", &mask(&self.secret_access_key))
            .field("account_id", &self.account_id)
            .finish()
    }
}
