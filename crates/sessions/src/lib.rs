//! Session store implementations for PersonaBot.

pub mod file_backend;
pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file_backend::FileSessionStore;
pub use in_memory::InMemorySessionStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSessionStore;

use personabot_config::SessionsConfig;
use personabot_core::SessionStore;
use personabot_core::error::SessionError;
use std::path::PathBuf;
use std::sync::Arc;

/// Open the store named by `config.backend`.
pub async fn open(config: &SessionsConfig) -> Result<Arc<dyn SessionStore>, SessionError> {
    let store: Arc<dyn SessionStore> = match config.backend.as_str() {
        "memory" => Arc::new(InMemorySessionStore::new()),
        "file" => {
            let path = config
                .path
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(FileSessionStore::default_path);
            Arc::new(FileSessionStore::new(path))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let path = config.path.clone().unwrap_or_else(|| {
                let file = personabot_config::AppConfig::config_dir().join("sessions.db");
                format!("sqlite://{}", file.display())
            });
            Arc::new(SqliteSessionStore::new(&path).await?)
        }
        other => {
            return Err(SessionError::Storage(format!(
                "Unsupported session backend '{other}'"
            )));
        }
    };

    tracing::info!(backend = store.name(), "Session store opened");
    Ok(store)
}
