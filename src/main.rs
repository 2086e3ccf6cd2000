//! Reelsmith CLI entry point.

use anyhow::Result;
use clap::Parser;
use reelsmith::cli::{commands, Cli, Commands};
use reelsmith::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("reelsmith={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let config_path = cli.config.as_ref().map(PathBuf::from);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Ensure data directories exist
    std::fs::create_dir_all(settings.data_dir())?;
    std::fs::create_dir_all(settings.temp_dir())?;

    match &cli.command {
        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Run {
            input,
            duration,
            category,
            requester,
            json,
        } => {
            commands::run_pipeline(
                input.clone(),
                duration.clone(),
                category.clone(),
                requester,
                *json,
                settings,
            )
            .await?;
        }

        Commands::Trends {
            category,
            region,
            timeframe,
            limit,
            json,
        } => {
            commands::run_trends(
                category,
                region.clone(),
                timeframe.clone(),
                *limit,
                *json,
                settings,
            )
            .await?;
        }

        Commands::Analyze { urls, json } => {
            commands::run_analyze(urls, *json, settings).await?;
        }

        Commands::Generate {
            prompts,
            series,
            requester,
        } => {
            commands::run_generate(prompts, *series, requester, settings).await?;
        }

        Commands::Assemble { references, requester } => {
            commands::run_assemble(references, requester, settings).await?;
        }

        Commands::Refs { key } => {
            commands::run_refs(key.as_deref(), settings).await?;
        }

        Commands::Agents { plan } => {
            commands::run_agents(plan.as_deref(), &settings)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, config_path, settings)?;
        }
    }

    Ok(())
}
