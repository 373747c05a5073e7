//! Topic classifier: scores a user message against the persona's rule table.
//!
//! Every keyword can contribute two independent points to its topic:
//!
//! 1. **Literal hit**: the keyword occurs in the lowercased message, either
//!    as a whole word (`\bkeyword\b`) or as a plain substring depending on
//!    the persona's [`MatchMode`].
//! 2. **Fuzzy hit**: the character-level similarity ratio between the
//!    keyword and the *whole* message exceeds the persona's threshold.
//!    This catches one-word typos such as "skils" or "hobbie". The ratio
//!    is bounded by `2·min(k, m) / (k + m)` for lengths `k` and `m`, so the
//!    diff only runs when the lengths alone can still clear the threshold.
//!
//! The highest score wins. Ties go to the first `specific` topic in table
//! order, otherwise to the first tied topic in table order, so the result
//! is fully deterministic. A message with no hits detects no topic.
//!
//! Classification is a pure function of the message and the prior session
//! state; it never touches the store.

use personabot_core::session::SessionState;
use personabot_core::{MatchMode, MatchingConfig, PersonaPromptSet, TopicName};
use regex_lite::Regex;
use serde::Serialize;
use similar::TextDiff;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on a single keyword diff.
const DIFF_DEADLINE: Duration = Duration::from_millis(5);

/// A single keyword prepared for matching.
#[derive(Debug)]
struct KeywordMatcher {
    keyword: String,
    /// Length in chars
    len: usize,
    word: Option<Regex>,
}

impl KeywordMatcher {
    fn new(raw: &str, mode: MatchMode) -> Option<Self> {
        let keyword = raw.trim().to_lowercase();
        if keyword.is_empty() {
            return None;
        }

        let word = match mode {
            MatchMode::Substring => None,
            MatchMode::Word => {
                let pattern = format!(r"\b{}\b", regex_lite::escape(&keyword));
                match Regex::new(&pattern) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!(
                            keyword = %keyword,
                            error = %e,
                            "Keyword pattern rejected, using substring match"
                        );
                        None
                    }
                }
            }
        };

        let len = keyword.chars().count();
        Some(Self { keyword, len, word })
    }

    /// Literal occurrence in an already-lowercased message.
    fn hits(&self, message: &str) -> bool {
        match &self.word {
            Some(re) => re.is_match(message),
            None => message.contains(&self.keyword),
        }
    }

    /// Best ratio any diff could reach between the keyword and a message
    /// of `message_len` chars.
    fn ratio_bound(&self, message_len: usize) -> f32 {
        let total = self.len + message_len;
        if total == 0 {
            return 0.0;
        }
        (2 * self.len.min(message_len)) as f32 / total as f32
    }

    /// Whether the similarity ratio exceeds `threshold`.
    fn fuzzy_hit(&self, message: &str, message_len: usize, threshold: f32) -> bool {
        if self.ratio_bound(message_len) <= threshold {
            return false;
        }
        TextDiff::configure()
            .timeout(DIFF_DEADLINE)
            .diff_chars(self.keyword.as_str(), message)
            .ratio()
            > threshold
    }
}

#[derive(Debug)]
struct CompiledTopic {
    name: TopicName,
    specific: bool,
    keywords: Vec<KeywordMatcher>,
}

/// Score for one topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicScore {
    pub topic: TopicName,
    pub score: u32,
    pub specific: bool,
}

/// The outcome of classifying one message.
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    /// Per-topic scores in rule-table order
    pub scores: Vec<TopicScore>,

    /// The winning topic, or `None` when nothing matched
    pub topic: Option<TopicName>,

    /// This message used experience vocabulary
    pub experience_mentioned: bool,

    /// The session flag after this message (sticky: prior flag OR mentioned)
    pub experience_asked: bool,
}

impl Classification {
    /// Whether `topic` scored at all on this message.
    pub fn matched(&self, topic: &TopicName) -> bool {
        self.scores
            .iter()
            .any(|s| &s.topic == topic && s.score > 0)
    }

    /// Score for a topic; zero for unknown topics.
    pub fn score_of(&self, topic: &TopicName) -> u32 {
        self.scores
            .iter()
            .find(|s| &s.topic == topic)
            .map_or(0, |s| s.score)
    }
}

/// Keyword/fuzzy classifier compiled from a persona's rule table.
#[derive(Debug)]
pub struct TopicClassifier {
    topics: Vec<CompiledTopic>,
    experience: Vec<KeywordMatcher>,
    matching: MatchingConfig,
}

impl TopicClassifier {
    pub fn new(persona: &PersonaPromptSet) -> Self {
        let mode = persona.matching.mode;
        let topics = persona
            .topics
            .iter()
            .map(|t| CompiledTopic {
                name: t.name.clone(),
                specific: t.specific,
                keywords: t
                    .keywords
                    .iter()
                    .filter_map(|k| KeywordMatcher::new(k, mode))
                    .collect(),
            })
            .collect();

        let experience = persona
            .experience_keywords
            .iter()
            .filter_map(|k| KeywordMatcher::new(k, mode))
            .collect();

        Self {
            topics,
            experience,
            matching: persona.matching.clone(),
        }
    }

    /// Classify `message` given the session state it arrives in.
    pub fn classify(&self, message: &str, prior: &SessionState) -> Classification {
        let normalized = message.to_lowercase();
        let message_len = normalized.chars().count();

        let scores: Vec<TopicScore> = self
            .topics
            .iter()
            .map(|t| TopicScore {
                topic: t.name.clone(),
                score: t
                    .keywords
                    .iter()
                    .map(|k| self.score_keyword(k, &normalized, message_len))
                    .sum(),
                specific: t.specific,
            })
            .collect();

        let topic = pick_winner(&scores);
        let experience_mentioned = self.experience.iter().any(|k| k.hits(&normalized));

        debug!(
            topic = topic.as_ref().map(|t| t.as_str()).unwrap_or("none"),
            experience_mentioned,
            "Message classified"
        );

        Classification {
            scores,
            topic,
            experience_mentioned,
            experience_asked: prior.experience_asked || experience_mentioned,
        }
    }

    fn score_keyword(
        &self,
        keyword: &KeywordMatcher,
        message: &str,
        message_len: usize,
    ) -> u32 {
        let literal = u32::from(keyword.hits(message));
        let fuzzy = u32::from(
            self.matching.fuzzy
                && keyword.fuzzy_hit(message, message_len, self.matching.fuzzy_threshold),
        );
        literal + fuzzy
    }
}

fn pick_winner(scores: &[TopicScore]) -> Option<TopicName> {
    let max = scores.iter().map(|s| s.score).max().unwrap_or(0);
    if max == 0 {
        return None;
    }

    let tied: Vec<&TopicScore> = scores.iter().filter(|s| s.score == max).collect();
    let winner = tied.iter().find(|s| s.specific).or(tied.first())?;
    Some(winner.topic.clone())
}
