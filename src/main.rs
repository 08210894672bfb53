mod app;
mod cli;
mod config;
mod config_store;
mod datasources;
mod db;
mod error;
mod irrigation;
mod logic;
mod models;
mod shutdown;

use anyhow::Context;
use app::App;
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use config_store::ConfigStore;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Load configuration
    let config_path = Config::find_config_path(cli.config.as_ref())?;
    let store = match ConfigStore::open(&config_path) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            eprintln!("Please copy config/gardenops.yaml.example to config/gardenops.yaml");
            std::process::exit(1);
        }
    };

    // Initialize logging
    let level = cli
        .default_log_level()
        .map(str::to_string)
        .or_else(|| store.get_or::<Option<String>>(&["system", "log_level"], None))
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)),
        )
        .init();
    tracing::info!(path = %store.path().display(), "Configuration loaded");

    let data_dir = Config::data_dir(cli.data_dir.as_ref())?;
    let command = cli.command();
    let app = if command.drives_relays() {
        App::new(Arc::clone(&store), &data_dir)
    } else {
        App::read_only(Arc::clone(&store), &data_dir)
    };
    let mut app = app
        .with_context(|| format!("failed to initialize data directory {}", data_dir.display()))?;

    let result = run_command(&mut app, command).await;
    if let Err(e) = app.shutdown().await {
        tracing::warn!(error = %e, "Hardware cleanup incomplete");
    }
    result
}

async fn run_command(app: &mut App, command: &Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run => {
            app.run_startup_checks().await;
            app.start();
            wait_for_shutdown().await;
        }
        Commands::Check => {
            let connections = app.check_connections().await;
            let report = app.run_startup_checks().await;
            let output = serde_json::json!({ "connections": connections, "zones": report });
            println!("{}", serde_json::to_string_pretty(&output)?);
            if !connections.all_connected() {
                anyhow::bail!("a remote data source is unreachable");
            }
            if !report.is_clean() {
                anyhow::bail!("{} zone(s) failed evaluation", report.failures.len());
            }
        }
        Commands::Cycle => {
            let report = app.run_cycle().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Evaluate { zone } => {
            let result = app
                .evaluate_zone(*zone)
                .await
                .with_context(|| format!("zone {} could not be evaluated", zone))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Water { zone, minutes } => {
            let outcome = app.water_zone(*zone, *minutes).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Status => {
            let status = app.status()?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }
    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGTERM, waiting for Ctrl-C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("Shutdown signal received");
}
