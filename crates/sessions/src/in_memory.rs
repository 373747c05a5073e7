//! In-memory store: useful for testing and single-process deployments.

use async_trait::async_trait;
use personabot_core::SessionStore;
use personabot_core::error::SessionError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Session blobs held in a map; lost on restart.
pub struct InMemorySessionStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, blob: String) -> Result<(), SessionError> {
        self.entries.write().await.insert(key.to_string(), blob);
        Ok(())
    }
}
