//! Prompt composition.
//!
//! Builds the role-tagged message list sent to the completion provider:
//! one system message and the user's message, verbatim.
//!
//! The system text is layered:
//!
//! 1. The persona's master prompt
//! 2. Whatever the active [`PromptStrategy`] contributes
//! 3. The recent-conversation block, when there are earlier turns
//!
//! Two strategies ship. [`PreselectedPrompt`] walks the persona's selection
//! order and layers a single topic sub-prompt. [`FullContextPrompt`] hands
//! the model the whole structured profile and lets it pick facts itself.
//! The rest of the pipeline does not know which one is active.

use crate::classifier::Classification;
use crate::history::HistoryWindow;
use personabot_config::PromptStrategyKind;
use personabot_core::message::Message;
use personabot_core::session::SessionState;
use personabot_core::{PersonaPromptSet, SelectionRule, TopicName};
use serde::Serialize;
use std::sync::Arc;

/// Which part of the persona the strategy put into the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "topic", rename_all = "snake_case")]
pub enum Selection {
    /// A topic sub-prompt
    Topic(TopicName),
    /// The persona's generic prompt
    Default,
    /// The full persona profile
    FullContext,
}

/// Inputs available to a strategy for one request.
pub struct PromptContext<'a> {
    pub persona: &'a PersonaPromptSet,
    pub classification: &'a Classification,
    /// Session state after the topic transition for this request
    pub state: &'a SessionState,
}

/// The strategy's contribution to the system text.
#[derive(Debug, Clone)]
pub struct StrategyOutput {
    pub text: String,
    pub selection: Selection,
}

/// Decides what persona content accompanies the master prompt.
pub trait PromptStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn build(&self, ctx: &PromptContext<'_>) -> StrategyOutput;
}

/// Pick one sub-prompt by walking the persona's selection order.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreselectedPrompt;

impl PreselectedPrompt {
    /// The first selection rule that applies, or `Default`.
    pub fn select(&self, ctx: &PromptContext<'_>) -> Selection {
        for rule in ctx.persona.selection_order() {
            let candidate = match &rule {
                SelectionRule::Keyword { topic } => {
                    ctx.classification.matched(topic).then_some(topic)
                }
                SelectionRule::ExperienceFlag { topic } => {
                    ctx.state.experience_asked.then_some(topic)
                }
                SelectionRule::CurrentTopic => ctx.state.current_topic.as_ref(),
            };

            if let Some(topic) = candidate {
                if ctx.persona.topic(topic).is_some() {
                    return Selection::Topic(topic.clone());
                }
            }
        }
        Selection::Default
    }
}

impl PromptStrategy for PreselectedPrompt {
    fn name(&self) -> &'static str {
        "preselected"
    }

    fn build(&self, ctx: &PromptContext<'_>) -> StrategyOutput {
        let selection = self.select(ctx);
        let text = match &selection {
            Selection::Topic(topic) => ctx
                .persona
                .sub_prompt(topic)
                .unwrap_or(&ctx.persona.default_prompt),
            _ => &ctx.persona.default_prompt,
        };
        StrategyOutput {
            text: text.trim().to_string(),
            selection,
        }
    }
}

/// Embed the whole persona profile and let the model choose.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullContextPrompt;

impl FullContextPrompt {
    fn profile_text(persona: &PersonaPromptSet) -> String {
        match &persona.profile {
            Some(profile) => {
                serde_json::to_string_pretty(profile).unwrap_or_else(|_| profile.to_string())
            }
            // No structured profile: fall back to every sub-prompt, labelled
            None => persona
                .topics
                .iter()
                .map(|t| format!("## {}\n{}", t.name, t.prompt.trim()))
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

impl PromptStrategy for FullContextPrompt {
    fn name(&self) -> &'static str {
        "full_context"
    }

    fn build(&self, ctx: &PromptContext<'_>) -> StrategyOutput {
        let text = format!(
            "{}\n\n{}",
            ctx.persona.full_context_instructions.trim(),
            Self::profile_text(ctx.persona)
        );
        StrategyOutput {
            text,
            selection: Selection::FullContext,
        }
    }
}

/// Strategy for a configured kind.
pub fn strategy_for(kind: PromptStrategyKind) -> Arc<dyn PromptStrategy> {
    match kind {
        PromptStrategyKind::Preselected => Arc::new(PreselectedPrompt),
        PromptStrategyKind::FullContext => Arc::new(FullContextPrompt),
    }
}

/// A prompt ready for the provider.
#[derive(Debug, Clone)]
pub struct ComposedPrompt {
    /// `[system, user]`
    pub messages: Vec<Message>,
    pub selection: Selection,
}

impl ComposedPrompt {
    pub fn system_text(&self) -> &str {
        self.messages.first().map_or("", |m| m.content.as_str())
    }
}

/// Assembles the message list for each request.
pub struct PromptComposer {
    persona: Arc<PersonaPromptSet>,
    strategy: Arc<dyn PromptStrategy>,
    window: HistoryWindow,
}

impl PromptComposer {
    pub fn new(
        persona: Arc<PersonaPromptSet>,
        strategy: Arc<dyn PromptStrategy>,
        window: HistoryWindow,
    ) -> Self {
        Self {
            persona,
            strategy,
            window,
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Compose the prompt for `message`.
    ///
    /// `state` must already hold this request's transition and the
    /// recorded turn, so the history block only shows earlier turns.
    pub fn compose(
        &self,
        message: &str,
        classification: &Classification,
        state: &SessionState,
    ) -> ComposedPrompt {
        let ctx = PromptContext {
            persona: &self.persona,
            classification,
            state,
        };
        let output = self.strategy.build(&ctx);

        let mut system = self.persona.master_prompt.trim().to_string();
        system.push_str("\n\n");
        system.push_str(&output.text);

        if let Some(history) = self.window.render(state) {
            system.push_str("\n\nRecent conversation:\n");
            system.push_str(&history);
        }

        ComposedPrompt {
            messages: vec![Message::system(system), Message::user(message)],
            selection: output.selection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TopicClassifier;
    use crate::topic_state;
    use personabot_core::message::Role;

    fn persona() -> Arc<PersonaPromptSet> {
        Arc::new(personabot_config::load_persona(None).unwrap())
    }

    /// Run one turn the way the orchestrator does and return the prompt.
    fn turn(
        persona: &Arc<PersonaPromptSet>,
        strategy: Arc<dyn PromptStrategy>,
        state: &mut SessionState,
        message: &str,
    ) -> ComposedPrompt {
        let window = HistoryWindow::default();
        let classification = TopicClassifier::new(persona).classify(message, state);
        topic_state::apply(state, &classification);
        window.record(state, message);
        PromptComposer::new(persona.clone(), strategy, window).compose(
            message,
            &classification,
            state,
        )
    }

    fn preselected(state: &mut SessionState, message: &str) -> ComposedPrompt {
        turn(&persona(), Arc::new(PreselectedPrompt), state, message)
    }

    #[test]
    fn single_category_messages_select_their_topic() {
        let persona = persona();
        for topic in &persona.topics {
            for keyword in &topic.keywords {
                let mut state = SessionState::default();
                let message = format!("Tell me about your {keyword}");
                let prompt = turn(&persona, Arc::new(PreselectedPrompt), &mut state, &message);
                assert_eq!(
                    prompt.selection,
                    Selection::Topic(topic.name.clone()),
                    "keyword '{keyword}'"
                );
            }
        }
    }

    #[test]
    fn skills_outranks_other_keywords() {
        let mut state = SessionState::default();
        let prompt = preselected(&mut state, "work skills");
        // the classifier prefers the specific topic, the composer the selection order
        assert_eq!(state.current_topic, Some("Work Experience".into()));
        assert_eq!(prompt.selection, Selection::Topic("Skills".into()));
        assert!(state.experience_asked);
    }

    #[test]
    fn academic_outranks_management() {
        let mut state = SessionState::default();
        let prompt = preselected(&mut state, "Did your degree help your leadership?");
        assert_eq!(prompt.selection, Selection::Topic("Academic Background".into()));
    }

    #[test]
    fn experience_flag_defaults_to_work_experience() {
        let mut state = SessionState {
            experience_asked: true,
            ..SessionState::default()
        };
        let prompt = preselected(&mut state, "And after that?");
        assert_eq!(prompt.selection, Selection::Topic("Work Experience".into()));
    }

    #[test]
    fn explicit_hobbies_beats_sticky_experience() {
        let mut state = SessionState {
            current_topic: Some("Work Experience".into()),
            experience_asked: true,
            ..SessionState::default()
        };
        let prompt = preselected(&mut state, "Tell me about your hobbies");
        assert_eq!(prompt.selection, Selection::Topic("Hobbies".into()));
        assert!(prompt.system_text().contains("mountaineering"));
        assert_eq!(state.current_topic, Some("Hobbies".into()));
        assert_eq!(state.previous_topic, Some("Work Experience".into()));
    }

    #[test]
    fn hobbies_never_chosen_without_keyword() {
        let mut state = SessionState {
            current_topic: Some("Hobbies".into()),
            ..SessionState::default()
        };
        let prompt = preselected(&mut state, "Anything else?");
        assert_eq!(prompt.selection, Selection::Default);
    }

    #[test]
    fn nothing_matched_uses_default_prompt() {
        let mut state = SessionState::default();
        let prompt = preselected(&mut state, "Hello there");
        assert_eq!(prompt.selection, Selection::Default);
        assert!(prompt.system_text().contains("Answer general questions"));
    }

    #[test]
    fn output_is_system_then_verbatim_user() {
        let mut state = SessionState::default();
        let prompt = preselected(&mut state, "  What is your GPA?  ");
        assert_eq!(prompt.messages.len(), 2);
        assert_eq!(prompt.messages[0].role, Role::System);
        assert_eq!(prompt.messages[1].role, Role::User);
        assert_eq!(prompt.messages[1].content, "  What is your GPA?  ");
        assert!(prompt.system_text().starts_with("You are Jordan Ellis"));
        assert!(prompt.system_text().contains("GPA 14/20"));
    }

    #[test]
    fn history_block_lists_earlier_turns_only() {
        let mut state = SessionState::default();
        for message in ["one", "two", "three", "four"] {
            preselected(&mut state, message);
        }
        let prompt = preselected(&mut state, "five");
        let system = prompt.system_text();
        assert!(system.ends_with("Recent conversation:\nUser: two\nUser: three\nUser: four"));
        assert!(!system.contains("User: five"));
        assert!(!system.contains("User: one"));
    }

    #[test]
    fn first_turn_has_no_history_block() {
        let mut state = SessionState::default();
        let prompt = preselected(&mut state, "hi");
        assert!(!prompt.system_text().contains("Recent conversation"));
    }

    #[test]
    fn current_topic_rule_falls_back_to_session_topic() {
        let mut persona = (*persona()).clone();
        persona.selection.push(SelectionRule::CurrentTopic);
        let persona = Arc::new(persona);

        let mut state = SessionState {
            current_topic: Some("Management Experience".into()),
            ..SessionState::default()
        };
        let prompt = turn(&persona, Arc::new(PreselectedPrompt), &mut state, "Go on");
        assert_eq!(prompt.selection, Selection::Topic("Management Experience".into()));
    }

    #[test]
    fn full_context_embeds_profile() {
        let mut state = SessionState::default();
        let prompt = turn(
            &persona(),
            strategy_for(PromptStrategyKind::FullContext),
            &mut state,
            "What is your GPA?",
        );
        assert_eq!(prompt.selection, Selection::FullContext);
        let system = prompt.system_text();
        assert!(system.contains("structured data"));
        assert!(system.contains("MSc in Economics"));
        assert!(system.contains("\"hobbies\""));
    }

    #[test]
    fn full_context_without_profile_lists_sub_prompts() {
        let mut persona = (*persona()).clone();
        persona.profile = None;
        let text = FullContextPrompt::profile_text(&persona);
        assert!(text.contains("## Skills"));
        assert!(text.contains("## Hobbies"));
    }

    #[test]
    fn strategy_names() {
        assert_eq!(strategy_for(PromptStrategyKind::Preselected).name(), "preselected");
        assert_eq!(strategy_for(PromptStrategyKind::FullContext).name(), "full_context");
    }
}
