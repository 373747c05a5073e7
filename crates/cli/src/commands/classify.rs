//! `personabot classify`: Inspect topic scoring for a message.

use personabot_agent::composer::{PreselectedPrompt, PromptContext, Selection};
use personabot_agent::{TopicClassifier, topic_state};
use personabot_config::AppConfig;
use personabot_core::session::SessionState;

pub fn run(
    message: &str,
    experience_asked: bool,
    raw: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let persona = personabot_config::load_persona(config.persona_path.as_deref())?;

    let mut state = SessionState {
        experience_asked,
        ..SessionState::default()
    };
    let classification = TopicClassifier::new(&persona).classify(message, &state);
    topic_state::apply(&mut state, &classification);
    let selection = PreselectedPrompt.select(&PromptContext {
        persona: &persona,
        classification: &classification,
        state: &state,
    });

    if raw {
        let out = serde_json::json!({
            "classification": classification,
            "selection": selection,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Persona: {}", persona.name);
    println!("Message: {message}\n");
    for score in &classification.scores {
        let marker = if score.specific { " (specific)" } else { "" };
        println!("  {:>2}  {}{marker}", score.score, score.topic);
    }

    println!();
    match &classification.topic {
        Some(topic) => println!("  Detected topic:   {topic}"),
        None => println!("  Detected topic:   none (session topic unchanged)"),
    }
    println!(
        "  Experience flag:  {}{}",
        classification.experience_asked,
        if classification.experience_mentioned {
            " (mentioned)"
        } else {
            ""
        }
    );
    match selection {
        Selection::Topic(topic) => println!("  Sub-prompt:       {topic}"),
        Selection::Default | Selection::FullContext => println!("  Sub-prompt:       default"),
    }

    Ok(())
}
