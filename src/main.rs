//! Inkforge - conversational tattoo design generator
//!
#![doc = "Main entry point for the Inkforge command-line tool."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use inkforge::cli::{Cli, Commands};
use inkforge::commands;
use inkforge::config::Config;
use inkforge::studio::Studio;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Initialize tracing once the output format is known
    init_tracing(cli.verbose, config.logging.json);
    tracing::debug!("Loaded configuration from {}", config_path);

    // Validate configuration; a missing API key stops here
    config.validate()?;

    let studio = Studio::from_config(&config)?;

    // Execute command
    match cli.command {
        Commands::Sessions { command } => {
            tracing::info!("Starting sessions command");
            commands::sessions::handle_sessions(&studio, command).await?;
            Ok(())
        }
        Commands::Generate {
            prompt,
            session,
            size,
            quality,
        } => {
            tracing::info!("Starting generation");
            if let Some(id) = &session {
                tracing::debug!("Continuing session: {}", id);
            }
            commands::generate::run_generate(&config, &studio, prompt, session, size, quality)
                .await?;
            Ok(())
        }
        Commands::Analyze {
            session,
            image,
            json,
        } => {
            tracing::info!("Starting analysis of image {}", image);
            commands::analyze::run_analyze(&studio, session, image, json).await?;
            Ok(())
        }
        Commands::Export { image, dest } => {
            tracing::info!("Starting export of image {}", image);
            commands::export::run_export(&studio, image, dest).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose {
        "inkforge=debug"
    } else {
        "inkforge=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
