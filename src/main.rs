use anyhow::Result;
use clap::Parser;

use audiogram::cli::{Cli, Command};
use audiogram::{config, export, preview};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Explicit --config must load; an auto-discovered one only warns
    let config = match config::discover(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            Err(err) if cli.config.is_none() => {
                log::warn!("Ignoring config {}: {:#}", path.display(), err);
                config::Config::default()
            }
            Err(err) => return Err(err),
        },
        None => config::Config::default(),
    };

    match &cli.command {
        Command::Export(args) => export::run_export(args, &config),
        Command::Frames(args) => export::run_frames(args, &config),
        Command::Preview(args) => preview::run_preview(args, &config),
    }
}
