mod bootstrap;
mod health;
mod sweep;

use anyhow::Result;
use refbot_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use refbot_core::config::LogFormat::*;
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
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        health::HealthState {
            bot_user_id: app.bot_user_id.clone(),
            cooldown: app.cooldown.clone(),
            transport_mode: "socket",
        },
    )
    .await?;
    let sweeper = sweep::spawn(app.cooldown.clone(), app.config.cooldown.window());

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bot_user_id = %app.bot_user_id,
        "refbot-server started"
    );

    tokio::select! {
        result = app.slack_runner.start() => result?,
        signal = tokio::signal::ctrl_c() => signal?,
    }

    sweeper.abort();
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "refbot-server stopping"
    );

    Ok(())
}
