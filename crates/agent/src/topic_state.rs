//! Session topic state machine.
//!
//! States are "no topic" plus every topic in the persona's table. A detected
//! topic that differs from the current one shifts current into previous; an
//! equal or absent detection leaves both untouched. There is no terminal
//! state and nothing ever clears the current topic.

use crate::classifier::Classification;
use personabot_core::TopicName;
use personabot_core::session::SessionState;

/// What a single transition did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Nothing detected, or the detected topic is already current
    Unchanged,
    /// Moved from `from` (possibly none) to `to`
    Moved {
        from: Option<TopicName>,
        to: TopicName,
    },
}

/// Apply a detected topic to the session.
pub fn transition(state: &mut SessionState, detected: Option<&TopicName>) -> Transition {
    match detected {
        Some(topic) if state.current_topic.as_ref() != Some(topic) => {
            let from = state.current_topic.replace(topic.clone());
            state.previous_topic = from.clone();
            Transition::Moved {
                from,
                to: topic.clone(),
            }
        }
        _ => Transition::Unchanged,
    }
}

/// Fold a classification into the session: topic transition plus the
/// sticky experience flag.
pub fn apply(state: &mut SessionState, classification: &Classification) -> Transition {
    state.experience_asked = state.experience_asked || classification.experience_asked;
    transition(state, classification.topic.as_ref())
}
