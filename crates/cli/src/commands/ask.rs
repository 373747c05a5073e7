//! `personabot ask`: One question through the full pipeline.

use personabot_agent::ChatRequest;
use personabot_config::AppConfig;
use tracing::info;

pub async fn run(
    message: String,
    session: String,
    raw: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if !config.has_api_key() && config.provider != "ollama" {
        return Err("No API key configured. Set PERSONABOT_API_KEY or OPENAI_API_KEY.".into());
    }

    let service = personabot_gateway::build_service(&config).await?;
    info!(session = %session, backend = %config.sessions.backend, "Asking persona");
    let response = service.handle(ChatRequest::new(message, session)).await;
    info!(status = response.status_code, "Persona answered");

    if raw {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    match (response.bot_reply(), response.error_message()) {
        (Some(reply), _) => println!("{reply}"),
        (None, Some(error)) => {
            return Err(format!("{} {}", response.status_code, error).into());
        }
        (None, None) => println!("{}", response.body),
    }
    Ok(())
}
