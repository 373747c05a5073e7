//! `personabot invoke`: Run a proxy event through the serverless adapter.

use personabot_config::AppConfig;
use std::io::Read;
use std::path::PathBuf;

pub async fn run(event: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let raw = match &event {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let event: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| format!("Event is not valid JSON: {e}"))?;

    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let service = personabot_gateway::build_service(&config).await?;
    let response = personabot_gateway::lambda::handle_event(&service, &event).await;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
