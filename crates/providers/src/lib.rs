//! Chat-completion provider implementations for PersonaBot.
//!
//! All providers implement the `personabot_core::Provider` trait.
//! `RetryProvider` wraps any of them with bounded exponential backoff.

pub mod openai_compat;
pub mod retry;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::{RetryPolicy, RetryProvider};
pub use router::{ProviderRouter, build_from_config};
