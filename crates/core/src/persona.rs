//! Persona prompt set: the static text and rule table a deployment runs on.
//!
//! A `PersonaPromptSet` is built once at process start and shared read-only
//! (behind an `Arc`) by every request. Nothing in the request path mutates it.

use crate::error::Error;
use crate::topic::{MatchingConfig, SelectionRule, TopicName, TopicRule};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Master prompt, per-topic sub-prompts, and classification rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaPromptSet {
    /// Display name of the impersonated subject
    pub name: String,

    /// Instruction text prepended to every composed prompt
    pub master_prompt: String,

    /// Sub-prompt used when no selection rule applies
    pub default_prompt: String,

    /// Instruction used by the full-context strategy ahead of the serialized profile
    #[serde(default = "default_full_context_instructions")]
    pub full_context_instructions: String,

    /// Vocabulary that sets the sticky "experience requested" session flag
    #[serde(default)]
    pub experience_keywords: Vec<String>,

    #[serde(default)]
    pub matching: MatchingConfig,

    /// Ordered rule table; earlier topics win unresolved classifier ties
    pub topics: Vec<TopicRule>,

    /// Sub-prompt selection order; empty means one keyword rule per topic, in table order
    #[serde(default)]
    pub selection: Vec<SelectionRule>,

    /// Structured persona data for the full-context strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<serde_json::Value>,
}

fn default_full_context_instructions() -> String {
    concat!(
        "Below is everything known about you, as structured data. ",
        "Pick only the facts relevant to the user's question and answer in the first person. ",
        "If the data does not cover the question, say that you do not have further details.",
    )
    .into()
}

impl PersonaPromptSet {
    /// Look up a topic rule by name.
    pub fn topic(&self, name: &TopicName) -> Option<&TopicRule> {
        self.topics.iter().find(|t| &t.name == name)
    }

    /// The sub-prompt text for a topic.
    pub fn sub_prompt(&self, name: &TopicName) -> Option<&str> {
        self.topic(name).map(|t| t.prompt.as_str())
    }

    /// The effective selection order.
    pub fn selection_order(&self) -> Vec<SelectionRule> {
        if !self.selection.is_empty() {
            return self.selection.clone();
        }
        self.topics
            .iter()
            .map(|t| SelectionRule::Keyword { topic: t.name.clone() })
            .collect()
    }

    /// Validate internal consistency.
    pub fn validate(&self) -> Result<(), Error> {
        if self.topics.is_empty() {
            return Err(config_error("persona must declare at least one topic"));
        }

        let mut seen = HashSet::new();
        for topic in &self.topics {
            if !seen.insert(&topic.name) {
                return Err(config_error(format!("duplicate topic '{}'", topic.name)));
            }
            if topic.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(config_error(format!("topic '{}' has no keywords", topic.name)));
            }
        }

        for rule in &self.selection {
            if let Some(name) = rule.topic() {
                if self.topic(name).is_none() {
                    return Err(config_error(format!(
                        "selection rule references unknown topic '{name}'"
                    )));
                }
            }
        }

        let threshold = self.matching.fuzzy_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(config_error("matching.fuzzy_threshold must be in (0.0, 1.0]"));
        }

        Ok(())
    }
}

fn config_error(message: impl Into<String>) -> Error {
    Error::Config { message: message.into() }
}
