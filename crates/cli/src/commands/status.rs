//! `personabot status`: Show effective configuration.

use personabot_config::AppConfig;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let persona = match &config.persona_path {
        Some(path) => path.display().to_string(),
        None => "built-in".to_string(),
    };
    let cap = config
        .sessions
        .max_stored_turns
        .map_or_else(|| "unbounded".to_string(), |n| n.to_string());

    println!("PersonaBot Status");
    println!("=================");
    println!("  Config dir:    {}", AppConfig::config_dir().display());
    println!("  Provider:      {}", config.provider);
    println!("  Model:         {}", config.model);
    println!("  Temperature:   {}", config.temperature);
    println!("  API key:       {}", if config.has_api_key() { "set" } else { "missing" });
    println!("  Persona:       {persona}");
    println!("  Strategy:      {:?}", config.chat.strategy);
    println!("  Sessions:      {} (stored turns: {cap})", config.sessions.backend);
    println!("  History:       last {} turns", config.chat.history_window);
    println!(
        "  Retry:         {} attempts, {}ms initial, x{}, {}ms max",
        config.retry.max_attempts,
        config.retry.initial_backoff_ms,
        config.retry.multiplier,
        config.retry.max_backoff_ms
    );
    println!(
        "  Gateway:       {}:{}{}",
        config.gateway.host, config.gateway.port, config.gateway.route
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!(
            "\n  No config file, running on defaults. Starter for {}:\n",
            config_path.display()
        );
        println!("{}", AppConfig::default_toml());
    }

    Ok(())
}
