//! File-based session store: one JSON object mapping session id to blob.
//!
//! Storage location: `~/.personabot/sessions.json`
//!
//! The whole map is loaded on creation and rewritten on every put. Fine for
//! a single process with modest traffic; use SQLite for anything larger.

use async_trait::async_trait;
use personabot_core::SessionStore;
use personabot_core::error::SessionError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A file-backed session store.
pub struct FileSessionStore {
    path: PathBuf,
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl FileSessionStore {
    /// Create a store at the given path.
    ///
    /// An existing file is loaded; a missing one is created on first write.
    pub fn new(path: PathBuf) -> Self {
        let entries = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = entries.len(), "File session store loaded");
        Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Default path: `~/.personabot/sessions.json`
    pub fn default_path() -> PathBuf {
        personabot_config::AppConfig::config_dir().join("sessions.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> BTreeMap<String, String> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return BTreeMap::new(),
        };

        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable session file");
                BTreeMap::new()
            }
        }
    }

    /// Write the full map to disk.
    async fn flush(&self) -> Result<(), SessionError> {
        let entries = self.entries.read().await;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SessionError::Storage(format!("Failed to create session directory: {e}"))
            })?;
        }

        let content = serde_json::to_string_pretty(&*entries)
            .map_err(|e| SessionError::Storage(format!("Failed to serialize sessions: {e}")))?;

        std::fs::write(&self.path, content)
            .map_err(|e| SessionError::Storage(format!("Failed to write session file: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, blob: String) -> Result<(), SessionError> {
        self.entries.write().await.insert(key.to_string(), blob);
        self.flush().await
    }
}
