//! The persona chat engine.
//!
//! A request flows through:
//!
//! 1. **Classify** the message against the persona's topic rule table
//! 2. **Transition** the session's current/previous topic
//! 3. **Record** the turn in the conversation history
//! 4. **Compose** master prompt + sub-prompt + recent turns
//! 5. **Complete** through the provider, retrying transient failures
//! 6. **Persist** the session and map the outcome to a response
//!
//! [`ChatService`] runs the whole pipeline; the stages are usable on their
//! own (the CLI's `classify` command uses only the classifier).

pub mod classifier;
pub mod composer;
pub mod history;
pub mod orchestrator;
pub mod response;
pub mod topic_state;

pub use classifier::{Classification, TopicClassifier, TopicScore};
pub use composer::{
    ComposedPrompt, FullContextPrompt, PreselectedPrompt, PromptComposer, PromptContext,
    PromptStrategy, Selection, StrategyOutput, strategy_for,
};
pub use history::{HistoryWindow, cap_history};
pub use orchestrator::{ChatError, ChatOptions, ChatOutcome, ChatService};
pub use response::{ChatRequest, ChatResponse, cors_headers};
pub use topic_state::Transition;
