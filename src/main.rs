//! `deskpilot` - local agent that drives a desktop editor from remote
//! session commands
//!
//! This binary owns the CLI and the server link; everything that
//! decides and acts lives in `deskpilot-core`.

use anyhow::{Context, Result};
use clap::Parser;
use console::Style;
use std::sync::Arc;

use crate::bridge::Bridge;
use crate::cli::{Cli, Commands};
use deskpilot_core::command::Command;
use deskpilot_core::config::AgentConfig;
use deskpilot_core::controller::EditorController;
use deskpilot_core::input::SystemInputBackend;
use deskpilot_core::keymap::Keymap;
use deskpilot_core::window::SystemWindowBackend;

mod bridge;
mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AgentConfig::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AgentConfig::load().context("loading configuration")?,
    };

    // Keymap problems are fatal at startup; there is no sane way to
    // drive an editor with an unknown key layout.
    let keymap = Keymap::load(&config.keymap_path)
        .with_context(|| format!("loading keymap {}", config.keymap_path.display()))?;

    match cli.command {
        Commands::Run { server_url } => {
            if let Some(url) = server_url {
                config.server_url = url;
            }
            let controller = build_controller(config.clone(), keymap);
            let bridge = Bridge::new(Arc::new(config), controller);
            tokio::select! {
                result = bridge.run() => result,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutting down");
                    Ok(())
                }
            }
        }

        Commands::Status => {
            let controller = build_controller(config, keymap);
            let status = controller.status();
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }

        Commands::Exec { json } => {
            let raw: serde_json::Value =
                serde_json::from_str(&json).context("command is not valid JSON")?;
            let command = Command::parse(&raw).context("command rejected")?;
            let controller = build_controller(config, keymap);
            let result = controller.execute(&command).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if result.success {
                let green = Style::new().green();
                eprintln!("{} {}", green.apply_to("ok"), result.message);
                Ok(())
            } else {
                let red = Style::new().red();
                eprintln!("{} {}", red.apply_to("failed"), result.message);
                anyhow::bail!("{}", result.message)
            }
        }
    }
}

fn build_controller(config: AgentConfig, keymap: Keymap) -> Arc<EditorController> {
    Arc::new(EditorController::new(
        Arc::new(config),
        Arc::new(keymap),
        Arc::new(SystemWindowBackend::new()),
        Arc::new(SystemInputBackend::new()),
    ))
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tungstenite=warn"));

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
