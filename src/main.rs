use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use castbar_backend::store::TomlSettingsStore;
use castbar_backend::{ControllerOptions, LifecycleController, ProcessRenderer};
use castbar_bridge::config::PlayerPreferences;
use castbar_frontend::TerminalShell;
use clap::Parser;

/// Casting receiver controller for the terminal.
#[derive(Parser, Debug)]
#[command(name = "castbar", version)]
struct Cli {
    /// Configuration file to use instead of the per-user one.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Renderer executable, overriding `backend.renderer_path`.
    #[arg(long, value_name = "PATH")]
    renderer: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    simple_logger::SimpleLogger::new()
        .with_colors(true)
        .with_threads(true)
        .with_local_timestamps()
        .with_level(log::LevelFilter::Debug)
        .env()
        .init()
        .context("failed to build logger instance")?;

    let store = match &cli.config {
        Some(path) => TomlSettingsStore::open(path),
        None => TomlSettingsStore::open_default(),
    }
    .context("failed to load configuration")?;
    log::debug!("Using configuration at {:?}", store.path());

    let mut config = store.config().clone();
    if let Some(renderer) = cli.renderer {
        config.backend.renderer_path = Some(renderer);
    }

    let shell = Arc::new(TerminalShell::new(config.update.release_page.clone()));
    let backend = Arc::new(
        ProcessRenderer::from_config(&config.backend)
            .with_player_preferences(PlayerPreferences::from_preferences(&config.preferences)),
    );
    let mut controller = LifecycleController::new(
        shell.clone(),
        backend,
        Box::new(store),
        ControllerOptions::from_config(&config),
    )
    .context("failed to create the lifecycle controller")?;

    controller.init();
    castbar_frontend::run(&mut controller, &shell)
}
