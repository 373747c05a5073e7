//! Session state and the key-value store it lives in.
//!
//! The store is deliberately dumb: it maps a session identifier to an opaque
//! serialized blob. `SessionState` owns the encoding, so every backend
//! (in-memory, file, SQLite, a managed cloud table) stores the same bytes.
//!
//! Access is read-then-write with no transactional guarantee. Two concurrent
//! requests for the same session identifier race and the last write wins.

use crate::error::SessionError;
use crate::topic::TopicName;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Who produced a history entry. Only user turns are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
}

/// One recorded conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub speaker: Speaker,
    pub text: String,
}

impl HistoryEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }
}

/// Per-session state persisted between requests.
///
/// An absent record is equivalent to `SessionState::default()`: no topic,
/// empty history, experience flag cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_topic: Option<TopicName>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_topic: Option<TopicName>,

    /// Arrival-ordered user turns; only a short suffix is ever read back
    #[serde(default)]
    pub conversation_history: Vec<HistoryEntry>,

    /// Sticky once set: the user has asked about experience at some point
    #[serde(default)]
    pub experience_asked: bool,
}

impl SessionState {
    /// Decode a stored blob.
    pub fn from_blob(key: &str, blob: &str) -> Result<Self, SessionError> {
        serde_json::from_str(blob).map_err(|e| SessionError::Corrupted {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Encode for storage.
    pub fn to_blob(&self) -> Result<String, SessionError> {
        serde_json::to_string(self)
            .map_err(|e| SessionError::Storage(format!("Failed to serialize session: {e}")))
    }
}

/// The session key-value store.
///
/// Implementations: in-memory, JSON file, SQLite.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The backend name (e.g., "memory", "file", "sqlite").
    fn name(&self) -> &str;

    /// Fetch the blob stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError>;

    /// Store `blob` under `key`, replacing any previous value.
    async fn put(&self, key: &str, blob: String) -> Result<(), SessionError>;
}

/// Load and decode a session; a missing key yields the default state.
pub async fn load_state(store: &dyn SessionStore, key: &str) -> Result<SessionState, SessionError> {
    match store.get(key).await? {
        Some(blob) => SessionState::from_blob(key, &blob),
        None => Ok(SessionState::default()),
    }
}

/// Encode and persist a session.
pub async fn save_state(
    store: &dyn SessionStore,
    key: &str,
    state: &SessionState,
) -> Result<(), SessionError> {
    store.put(key, state.to_blob()?).await
}
