//! # PersonaBot Core
//!
//! Domain types, traits, and error definitions for the PersonaBot chat
//! backend. This crate performs **no I/O**; it defines the domain model
//! that the provider, session, and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (the completion API, the session store) is a
//! trait here. Implementations live in their respective crates, so the
//! request pipeline can be exercised end to end with in-process mocks.

pub mod error;
pub mod message;
pub mod persona;
pub mod provider;
pub mod session;
pub mod topic;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, SessionError};
pub use message::{Message, Role};
pub use persona::PersonaPromptSet;
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use session::{HistoryEntry, SessionState, SessionStore, Speaker};
pub use topic::{MatchMode, MatchingConfig, SelectionRule, TopicName, TopicRule};
