//! PersonaBot CLI, the main entry point.
//!
//! Commands:
//! - `serve`    Start the HTTP gateway
//! - `ask`      Send one message through the full pipeline
//! - `classify` Show how a message is classified, without calling a model
//! - `invoke`   Run an API-gateway proxy event through the serverless adapter
//! - `status`   Show the effective configuration
//! - `doctor`   Diagnose configuration problems

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "personabot",
    about = "PersonaBot, a digital persona chat backend",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask the persona a single question
    Ask {
        /// The question
        message: String,

        /// Session identifier; reuse it to continue a conversation
        #[arg(short, long, default_value = "cli")]
        session: String,

        /// Print the full structured response
        #[arg(long)]
        raw: bool,
    },

    /// Classify a message and show the selected sub-prompt
    Classify {
        /// The message to classify
        message: String,

        /// Treat the session as having asked about experience before
        #[arg(long)]
        experience_asked: bool,

        /// Print the classification as JSON
        #[arg(long)]
        raw: bool,
    },

    /// Run a proxy event (JSON) through the serverless adapter
    Invoke {
        /// Event file; reads stdin when omitted
        #[arg(short, long)]
        event: Option<PathBuf>,
    },

    /// Show effective configuration
    Status,

    /// Diagnose configuration health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Ask {
            message,
            session,
            raw,
        } => commands::ask::run(message, session, raw).await?,
        Commands::Classify {
            message,
            experience_asked,
            raw,
        } => commands::classify::run(&message, experience_asked, raw)?,
        Commands::Invoke { event } => commands::invoke::run(event).await?,
        Commands::Status => commands::status::run()?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
