//! # Credential Store
//!
//! Persistence for the session's cryptographic material.
//!
//! ## Storage Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Credential Store Layout                            │
//! │                                                                         │
//! │  SessionState (in memory)          auth_state/ (on disk)               │
//! │  ┌──────────────────────────┐      ┌──────────────────────────┐        │
//! │  │ "creds.json"     → {...} │ ◄──► │ creds.json               │        │
//! │  │ "app-state-..."  → {...} │      │ app-state-sync-key-A.json│        │
//! │  │ "pre-key-1.json" → {...} │      │ pre-key-1.json           │        │
//! │  └──────────────────────────┘      └──────────────────────────┘        │
//! │                                                                         │
//! │  • Created on first pairing, mutated on every rotation event           │
//! │  • Never deleted automatically                                         │
//! │  • An empty state signals a fresh session (pairing required)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cloud variant ([`crate::remote::CloudStore`]) wraps [`FileStore`]
//! and mirrors the directory to a remote object store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};

// =============================================================================
// Session State
// =============================================================================

/// Opaque credential material for resuming the protocol session.
///
/// Modeled as an ordered map of file name → JSON document. The content is
/// produced and consumed by the protocol engine; the bridge only moves it
/// between the engine and storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionState {
    files: BTreeMap<String, serde_json::Value>,
}

impl SessionState {
    /// Empty state: a fresh session that will require pairing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no credential material exists yet.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of credential files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Inserts or replaces one credential file.
    pub fn insert(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.files.insert(name.into(), value);
    }

    /// Looks up one credential file.
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.files.get(name)
    }

    /// Iterates over (file name, document) pairs.
    pub fn files(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.files.iter()
    }
}

/// Sanitizes a credential file name for the filesystem.
///
/// Signal-style key identifiers can contain `/` and `:`; both are replaced
/// so every state entry maps to a single flat file.
pub fn sanitize_name(name: &str) -> String {
    name.replace('/', "__").replace(':', "-")
}

// =============================================================================
// Credential Store Trait
// =============================================================================

/// Persistence seam for session credentials.
///
/// Exactly one store instance backs the single session. `save` is invoked
/// once per credential-rotation event; implementations must not coalesce.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Loads the full session state. An empty state is not an error; it
    /// signals a fresh session.
    async fn load(&self) -> BridgeResult<SessionState>;

    /// Persists the full session state.
    async fn save(&self, state: &SessionState) -> BridgeResult<()>;
}

// =============================================================================
// File Store (local variant)
// =============================================================================

/// Credential store backed by a directory of JSON files.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `dir`. The directory is created lazily on
    /// first use.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    /// Directory holding the credential files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn ensure_dir(&self) -> BridgeResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| BridgeError::CredsSaveFailed(format!("{}: {}", self.dir.display(), e)))
    }
}

#[async_trait]
impl CredentialStore for FileStore {
    async fn load(&self) -> BridgeResult<SessionState> {
        let mut state = SessionState::new();

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            // Missing directory == fresh session
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %self.dir.display(), "No credential directory, starting fresh");
                return Ok(state);
            }
            Err(e) => {
                return Err(BridgeError::CredsLoadFailed(format!(
                    "{}: {}",
                    self.dir.display(),
                    e
                )))
            }
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BridgeError::CredsLoadFailed(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| BridgeError::CredsLoadFailed(format!("{}: {}", path.display(), e)))?;
            let value: serde_json::Value = serde_json::from_str(&contents).map_err(|e| {
                BridgeError::CredsLoadFailed(format!("{}: invalid JSON: {}", path.display(), e))
            })?;
            state.insert(name.to_string(), value);
        }

        debug!(files = state.len(), dir = %self.dir.display(), "Credentials loaded");
        Ok(state)
    }

    async fn save(&self, state: &SessionState) -> BridgeResult<()> {
        self.ensure_dir().await?;

        for (name, value) in state.files() {
            let path = self.dir.join(sanitize_name(name));
            let contents = serde_json::to_string_pretty(value)?;
            tokio::fs::write(&path, contents)
                .await
                .map_err(|e| BridgeError::CredsSaveFailed(format!("{}: {}", path.display(), e)))?;
        }

        debug!(files = state.len(), dir = %self.dir.display(), "Credentials saved");
        Ok(())
    }
}

// =============================================================================
// Memory Store (tests)
// =============================================================================

/// In-memory credential store for tests.
pub struct MemoryStore {
    state: RwLock<SessionState>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            state: RwLock::new(SessionState::new()),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of completed `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Current stored state.
    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn load(&self) -> BridgeResult<SessionState> {
        Ok(self.state.read().await.clone())
    }

    async fn save(&self, state: &SessionState) -> BridgeResult<()> {
        *self.state.write().await = state.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_state() -> SessionState {
        let mut state = SessionState::new();
        state.insert("creds.json", json!({"noiseKey": {"private": "abc"}}));
        state.insert("app-state-sync-key-AAAAAA.json", json!({"keyData": "xyz"}));
        state
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("creds.json"), "creds.json");
        assert_eq!(sanitize_name("session-1/device:2.json"), "session-1__device-2.json");
    }

    #[test]
    fn test_empty_state_is_fresh() {
        assert!(SessionState::new().is_empty());
        assert!(!sample_state().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("auth"));

        let state = sample_state();
        store.save(&state).await.unwrap();

        // A fresh store over the same directory reconstructs the state
        let reloaded = FileStore::new(dir.path().join("auth")).load().await.unwrap();
        assert_eq!(reloaded, state);
    }

    #[tokio::test]
    async fn test_file_store_load_missing_dir_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("never-created"));
        let state = store.load().await.unwrap();
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_file_store_ignores_non_json_files() {
        let dir = tempfile::tempdir().unwrap();
        let auth = dir.path().join("auth");
        std::fs::create_dir_all(&auth).unwrap();
        std::fs::write(auth.join("creds.json"), "{\"a\":1}").unwrap();
        std::fs::write(auth.join("README.txt"), "not credentials").unwrap();

        let state = FileStore::new(&auth).load().await.unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(state.get("creds.json"), Some(&json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_memory_store_counts_saves() {
        let store = MemoryStore::new();
        assert_eq!(store.save_count(), 0);

        store.save(&sample_state()).await.unwrap();
        store.save(&sample_state()).await.unwrap();
        assert_eq!(store.save_count(), 2);
        assert_eq!(store.load().await.unwrap(), sample_state());
    }
}
