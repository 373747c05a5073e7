//! Topic rule table: the configuration the classifier and composer run on.
//!
//! Topics are not a compiled-in enum: each persona file declares its own
//! ordered list of topics, their keyword sets, and the order in which the
//! composer consults them. Adding or renaming a topic never touches the
//! matching algorithm.

use serde::{Deserialize, Serialize};

/// The name of a conversation topic (e.g. "Academic Background").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicName(pub String);

impl TopicName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TopicName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TopicName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One row of the rule table: a topic, its keywords, and its sub-prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRule {
    /// Topic name, unique within a persona
    pub name: TopicName,

    /// Keywords or short phrases; matched case-insensitively
    pub keywords: Vec<String>,

    /// Specific topics win classifier ties against general ones
    #[serde(default)]
    pub specific: bool,

    /// Sub-prompt layered under the master prompt when this topic is selected
    pub prompt: String,
}

/// How a keyword is located inside a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Whole-word match (`\bkeyword\b`)
    #[default]
    Word,
    /// Plain substring containment
    Substring,
}

/// Matching parameters shared by every keyword in a persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default)]
    pub mode: MatchMode,

    /// Whether the similarity-ratio signal is scored at all
    #[serde(default = "default_true")]
    pub fuzzy: bool,

    /// Ratio (0.0 to 1.0) a keyword/message pair must exceed to score
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f32,
}

fn default_true() -> bool {
    true
}

fn default_fuzzy_threshold() -> f32 {
    0.8
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            mode: MatchMode::Word,
            fuzzy: true,
            fuzzy_threshold: default_fuzzy_threshold(),
        }
    }
}

/// A step in the composer's sub-prompt selection order.
///
/// Steps are evaluated top to bottom; the first that applies picks the
/// sub-prompt. When none applies the persona's default prompt is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum SelectionRule {
    /// The current message matched one of the topic's keywords
    Keyword { topic: TopicName },
    /// The session's sticky experience flag is set
    ExperienceFlag { topic: TopicName },
    /// Fall back to whatever topic the session is currently on
    CurrentTopic,
}

impl SelectionRule {
    /// The topic this rule refers to, if it names one.
    pub fn topic(&self) -> Option<&TopicName> {
        match self {
            Self::Keyword { topic } | Self::ExperienceFlag { topic } => Some(topic),
            Self::CurrentTopic => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_rule_tagged_serialization() {
        let rule = SelectionRule::ExperienceFlag { topic: "Software Experience".into() };
        let json = serde_json::to_string(&rule).unwrap();
        assert!(json.contains(r#""rule":"experience_flag""#));
        assert!(json.contains("Software Experience"));

        let parsed: SelectionRule = serde_json::from_str(r#"{"rule":"current_topic"}"#).unwrap();
        assert_eq!(parsed, SelectionRule::CurrentTopic);
        assert!(parsed.topic().is_none());
    }

    #[test]
    fn matching_defaults() {
        let cfg: MatchingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.mode, MatchMode::Word);
        assert!(cfg.fuzzy);
        assert!((cfg.fuzzy_threshold - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn topic_name_is_transparent() {
        let name = TopicName::new("Skills");
        assert_eq!(serde_json::to_string(&name).unwrap(), r#""Skills""#);
        assert_eq!(name.to_string(), "Skills");
    }
}
