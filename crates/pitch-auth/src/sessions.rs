//! Session storage for farming accounts
//!
//! Manages a JSON file mapping account identities (phone numbers) to the
//! source of their web-app hand-off. All writes use atomic temp-file + rename
//! to prevent corruption on crash, and the file is kept at 0600 because a
//! stored hand-off URL is a live credential.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use messenger::{CommandMessenger, Messenger, StoredWebApp};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// How an account obtains its web-app hand-off URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HandOffSource {
    /// A captured web-view URL replayed as-is
    WebAppUrl { url: String },
    /// An external helper program printing a fresh URL per request
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

/// A single account's stored session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    #[serde(flatten)]
    pub source: HandOffSource,
    pub added_at: DateTime<Utc>,
}

impl SessionEntry {
    pub fn new(source: HandOffSource) -> Self {
        Self {
            source,
            added_at: Utc::now(),
        }
    }

    /// Build the messenger this session describes.
    pub fn messenger(&self, account: &str, command_timeout: Duration) -> Arc<dyn Messenger> {
        match &self.source {
            HandOffSource::WebAppUrl { url } => Arc::new(StoredWebApp::new(url.clone())),
            HandOffSource::Command { program, args } => Arc::new(CommandMessenger::new(
                account,
                program.clone(),
                args.clone(),
                command_timeout,
            )),
        }
    }
}

/// Validate a phone-number account identity and strip a leading `+`.
pub fn normalize_phone(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidAccount(format!(
            "{raw:?} is not a phone number"
        )));
    }
    Ok(digits.to_string())
}

/// Thread-safe session file manager.
///
/// The Mutex serializes all writes; reads clone out of the in-memory map.
pub struct SessionStore {
    path: PathBuf,
    state: Mutex<BTreeMap<String, SessionEntry>>,
}

impl SessionStore {
    /// Load sessions from the given file path.
    ///
    /// If the file doesn't exist, creates it as `{}` (cold start with zero
    /// accounts), creating the parent directory when needed.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading session file: {e}")))?;
            let sessions: BTreeMap<String, SessionEntry> = serde_json::from_str(&contents)
                .map_err(|e| Error::SessionParse(format!("parsing session file: {e}")))?;
            info!(path = %path.display(), accounts = sessions.len(), "loaded sessions");
            sessions
        } else {
            info!(path = %path.display(), "session file not found, starting with empty store");
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| Error::Io(format!("creating session directory: {e}")))?;
            }
            let store = BTreeMap::new();
            write_atomic(&path, &store).await?;
            store
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// All accounts with their sessions, ordered by account.
    pub async fn entries(&self) -> Vec<(String, SessionEntry)> {
        let state = self.state.lock().await;
        state
            .iter()
            .map(|(account, entry)| (account.clone(), entry.clone()))
            .collect()
    }

    /// Add or replace a session and persist to disk.
    pub async fn add(&self, account: &str, entry: SessionEntry) -> Result<()> {
        let account = normalize_phone(account)?;
        let mut state = self.state.lock().await;
        state.insert(account.clone(), entry);
        debug!(account, "added session");
        write_atomic(&self.path, &state).await
    }
}

/// Write sessions to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets file permissions to 0600 (owner read/write only).
async fn write_atomic(path: &Path, data: &BTreeMap<String, SessionEntry>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::SessionParse(format!("serializing sessions: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("session path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".sessions.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp session file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting session file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), "persisted sessions");
    Ok(())
}
