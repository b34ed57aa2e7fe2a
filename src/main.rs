//! faucet-relay
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────────┐
//!                    │                   FAUCET RELAY                     │
//!                    │                                                    │
//!  POST /withdraw    │  ┌─────────┐    ┌───────────┐    ┌─────────────┐  │
//!  ──────────────────┼─▶│  http   │───▶│ admission │───▶│ blockchain  │──┼──▶ JSON-RPC node
//!                    │  │ server  │    │   guard   │    │   relay     │  │
//!                    │  └─────────┘    └─────┬─────┘    └─────────────┘  │
//!                    │                       │                            │
//!                    │                       ▼                            │
//!                    │                 ┌───────────┐                      │
//!                    │                 │   store   │──────────────────────┼──▶ Redis
//!                    │                 └───────────┘                      │
//!                    │                                                    │
//!                    │  config · observability · resilience · lifecycle   │
//!                    └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use faucet_relay::config::{load_config, load_env_file, FaucetConfig};
use faucet_relay::lifecycle::{signals, startup, Shutdown, StartupError};
use faucet_relay::observability::{logging, metrics};
use faucet_relay::HttpServer;

#[derive(Parser)]
#[command(name = "faucet-relay")]
#[command(version, about = "Rate-limited faucet withdrawal relay", long_about = None)]
struct Cli {
    /// Path to a TOML config file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and the signing key, then exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let env_file = load_env_file();
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("faucet-relay: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.check {
        return match startup::preflight(&config, |var| std::env::var(var).ok()) {
            Ok(account) => {
                println!("faucet-relay: configuration OK (account {})", account);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("faucet-relay: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "faucet-relay starting");
    match env_file {
        Ok(path) => tracing::info!(path = %path.display(), "Loaded .env file"),
        Err(e) => tracing::debug!(error = %e, "No .env file loaded"),
    }

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: FaucetConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let components = startup::build_components(&config).await?;
    let listener = startup::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_termination().await;
        shutdown.trigger();
    });

    HttpServer::new(&config, components.guard, components.relay)
        .run(listener, stop)
        .await?;
    Ok(())
}
