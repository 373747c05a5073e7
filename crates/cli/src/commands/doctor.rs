//! `personabot doctor`: Diagnose configuration health.

use personabot_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("PersonaBot Doctor");
    println!("=================\n");

    let mut issues = 0;

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  [ok]   Config valid");
            config
        }
        Err(e) => {
            println!("  [fail] Config invalid: {e}");
            println!("\n  1 issue found. Fix the config before continuing.");
            return Ok(());
        }
    };

    if config.has_api_key() || config.provider == "ollama" {
        println!("  [ok]   API key configured");
    } else {
        println!("  [warn] No API key, set PERSONABOT_API_KEY or OPENAI_API_KEY");
        issues += 1;
    }

    match personabot_providers::build_from_config(&config) {
        Ok(router) => println!(
            "  [ok]   Provider '{}' ready ({} registered)",
            config.provider,
            router.list().len()
        ),
        Err(e) => {
            println!("  [fail] Provider: {e}");
            issues += 1;
        }
    }

    match personabot_config::load_persona(config.persona_path.as_deref()) {
        Ok(persona) => println!(
            "  [ok]   Persona '{}' with {} topics",
            persona.name,
            persona.topics.len()
        ),
        Err(e) => {
            println!("  [fail] Persona: {e}");
            issues += 1;
        }
    }

    match personabot_sessions::open(&config.sessions).await {
        Ok(store) => println!("  [ok]   Session store '{}' opened", store.name()),
        Err(e) => {
            println!("  [fail] Session store: {e}");
            issues += 1;
        }
    }

    if config.chat.history_window == 0 {
        println!("  [warn] history_window is 0, earlier turns are never shown to the model");
        issues += 1;
    }

    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
