//! cache-relay - CI cache restore and save
//!
//! CLI entry point that dispatches to subcommands.

use cache_relay::cli::{commands, run_to_exit_code, Cli, Commands, ExecutionMode};
use cache_relay::config::{Config, ConfigManager};
use cache_relay::error::CacheResult;
use cache_relay::logging;
use cache_relay::orchestration::{install_panic_downgrade, CacheContext};
use cache_relay::runner::RunnerEnv;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let early_exit = !cli.no_early_exit;

    let code = run_to_exit_code(run(cli)).await;

    // Blocking transfers that timed out may still hold runtime threads
    if early_exit {
        std::process::exit(i32::from(code));
    }

    ExitCode::from(code)
}

async fn run(cli: Cli) -> CacheResult<()> {
    let env = RunnerEnv::capture();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await;

    let log_format = config
        .as_ref()
        .map(|c| c.general.log_format.as_str())
        .unwrap_or("text");
    logging::init(cli.verbose, env.step_debug, log_format);

    if cli.command.is_save() {
        install_panic_downgrade();
    }

    // Saving is best effort, so a broken config file only fails restores
    let config = match config {
        Ok(config) => config,
        Err(e) if cli.command.is_save() => {
            warn!("{}; saving with the default configuration", e);
            Config::default()
        }
        Err(e) => return Err(e),
    };
    debug!("Configuration loaded from {}", config_manager.path().display());

    let context = Arc::new(CacheContext::new(env, &config));
    debug!("Using {} backend", context.backend.kind().name());

    match cli.command {
        Commands::Restore(args) => {
            commands::restore(args, ExecutionMode::Phase, context, &config).await
        }
        Commands::RestoreOnly(args) => {
            commands::restore(args, ExecutionMode::Standalone, context, &config).await
        }
        Commands::Save(args) => commands::save(args, ExecutionMode::Phase, context, &config).await,
        Commands::SaveOnly(args) => {
            commands::save(args, ExecutionMode::Standalone, context, &config).await
        }
    }
}
