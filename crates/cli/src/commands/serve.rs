//! `personabot serve`: Start the HTTP gateway.

use personabot_config::AppConfig;
use tracing::info;

pub async fn run(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(p) = port {
        info!(port = p, "Port overridden from the command line");
        config.gateway.port = p;
    }

    println!(
        "PersonaBot listening on http://{}:{}{}",
        config.gateway.host, config.gateway.port, config.gateway.route
    );
    println!("   Press Ctrl+C to stop.\n");

    personabot_gateway::start(config).await
}
