mod bootstrap;
mod health;

use anyhow::Result;
use databot_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use databot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // A missing .env is fine; the environment may already carry everything.
    let dotenv = dotenvy::dotenv();

    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);
    if let Ok(path) = dotenv {
        tracing::debug!(
            event_name = "system.bootstrap.dotenv_loaded",
            correlation_id = "bootstrap",
            path = %path.display(),
            "loaded environment file"
        );
    }

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.config.sheets.clone(),
    )
    .await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        spreadsheet_id = %app.config.sheets.spreadsheet_id,
        "databot-server started"
    );

    tokio::select! {
        result = app.slack_runner.start() => {
            result?;
            tracing::warn!(
                event_name = "system.server.slack_runner_stopped",
                correlation_id = "shutdown",
                "slack socket mode runner stopped"
            );
        }
        result = wait_for_shutdown() => result?,
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "databot-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
