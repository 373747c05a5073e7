//! Persona file loading.
//!
//! A persona file is TOML holding the master prompt, the topic rule table,
//! and the selection order. One is compiled into the binary so a fresh
//! deployment works without any files on disk.

use crate::ConfigError;
use personabot_core::PersonaPromptSet;
use std::path::{Path, PathBuf};

/// The built-in persona.
pub const DEFAULT_PERSONA_TOML: &str = include_str!("../personas/default.toml");

/// Parse and validate persona TOML. `origin` is used in error messages.
pub fn parse_persona(content: &str, origin: &Path) -> Result<PersonaPromptSet, ConfigError> {
    let persona: PersonaPromptSet = toml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: origin.to_path_buf(),
        reason: e.to_string(),
    })?;

    persona
        .validate()
        .map_err(|e| ConfigError::ValidationError(format!("{}: {e}", origin.display())))?;

    Ok(persona)
}

/// Load the persona at `path`, or the built-in one when `path` is `None`.
pub fn load_persona(path: Option<&Path>) -> Result<PersonaPromptSet, ConfigError> {
    let Some(path) = path else {
        return parse_persona(DEFAULT_PERSONA_TOML, &PathBuf::from("<built-in persona>"));
    };

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let persona = parse_persona(&content, path)?;
    tracing::info!(
        path = %path.display(),
        topics = persona.topics.len(),
        "Persona loaded"
    );
    Ok(persona)
}
