//! Vaultguard CLI entry point.
//!
//! Provides `console`, `demo`, and `check-config` subcommands for running an
//! interactive session, walking through a scripted session, or validating a
//! configuration file.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::info;

use vaultguard::clock::SystemClock;
use vaultguard::config::{self, Config};
use vaultguard::console;
use vaultguard::controller::Controller;
use vaultguard::logging;

/// Vaultguard facility-access controller.
#[derive(Parser)]
#[command(name = "vaultguard", version, about)]
struct Cli {
    /// Path to config.toml (default: ~/.vaultguard/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write JSON logs to this directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run an interactive console session on stdin/stdout.
    Console,
    /// Walk through a full scripted session and print the final state.
    Demo {
        /// Skip every settle delay.
        #[arg(long)]
        instant: bool,
    },
    /// Validate the configuration and exit.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref())?;

    let _logging_guard = match &cli.log_dir {
        Some(dir) => Some(logging::init_file(dir, &config.logging.level)?),
        None => {
            logging::init_cli(&config.logging.level);
            None
        }
    };

    match cli.command {
        Command::Console => handle_console(config).await,
        Command::Demo { instant } => handle_demo(config, instant).await,
        Command::CheckConfig => handle_check_config(&config),
    }
}

fn resolve_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => config::load_config(path)
            .with_context(|| format!("failed to load {}", path.display())),
        None => config::load_default_config().context("failed to load default config"),
    }
}

/// Run the interactive console.
async fn handle_console(config: Config) -> anyhow::Result<()> {
    let handle = Controller::spawn(&config, Arc::new(SystemClock));
    info!("console session started");
    console::run_console(&handle, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

/// Run the scripted demo.
///
/// The passcode typed at step 4 comes from `VAULTGUARD_DEMO_PASSCODE`,
/// defaulting to the stock code.
async fn handle_demo(config: Config, instant: bool) -> anyhow::Result<()> {
    let config = if instant {
        config.without_delays()
    } else {
        config
    };
    let handle = Controller::spawn(&config, Arc::new(SystemClock));
    let passcode = std::env::var("VAULTGUARD_DEMO_PASSCODE")
        .unwrap_or_else(|_| vaultguard::auth::DEFAULT_PASSCODE.to_owned());
    console::run_demo(&handle, &passcode, tokio::io::stdout()).await
}

/// Validate configuration and print a summary.
fn handle_check_config(config: &Config) -> anyhow::Result<()> {
    config.validate()?;
    println!("configuration ok");
    println!(
        "  factor delays: biometric={}ms retinal={}ms voice={}ms",
        config.auth.factor_delays_ms.biometric,
        config.auth.factor_delays_ms.retinal,
        config.auth.factor_delays_ms.voice
    );
    println!("  grant delay: {}ms", config.auth.grant_delay_ms);
    println!("  toggle delay: {}ms", config.vault.toggle_delay_ms);
    Ok(())
}
