//! Keycheck command line interface
//!
//! Checks the signing keys node operators published in the registry, or
//! keys proposed in a deposit-data file, for malformed bytes, duplicates and
//! deposit signatures that do not match the withdrawal credentials.

mod app_config;
mod render;

use anyhow::{Context, Result};
use app_config::{AppConfig, Overrides};
use clap::{Parser, Subcommand};
use keycheck_core::{Orchestrator, RunMode};
use keycheck_registry::parse_input_keys;
use keycheck_rpc::{CancellationToken, JsonRpcProvider};
use keycheck_storage::{SledValidationCache, ValidationCache};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "keycheck")]
#[command(about = "Validator key checks for the node operator registry", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every key in the registry
    ValidateNetworkKeys {
        /// Skip keys already known to be valid and used
        #[arg(long)]
        fast: bool,
    },
    /// Check keys from a deposit-data file against the registry
    ValidateFileKeys {
        #[arg(long, default_value = "input.json")]
        file: PathBuf,
    },
    /// Remove every cached validation result for the connected chain
    ClearCache,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            eprintln!("Error: {err:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = AppConfig::load(cli.config.as_deref(), &cli.overrides)?;
    init_logging(&config)?;

    // Read the input before touching the chain so a bad file fails fast.
    let inputs = match &cli.command {
        Commands::ValidateFileKeys { file } => {
            let json = std::fs::read_to_string(file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            Some(parse_input_keys(&json).with_context(|| format!("failed to parse {}", file.display()))?)
        }
        _ => None,
    };

    let provider = Arc::new(JsonRpcProvider::new(&config.rpc_url, config.multicall_address)?);
    let chain_id = provider
        .chain_id()
        .await
        .with_context(|| format!("failed to query chain id from {}", provider.endpoint()))?;
    let network = config.resolve_network(chain_id)?;
    info!(%network, chain_id, endpoint = %provider.endpoint(), "connected");

    let cache = SledValidationCache::open(&config.cache_dir, chain_id).with_context(|| {
        format!(
            "failed to open validation cache in {}",
            config.cache_dir.display()
        )
    })?;

    if let Commands::ClearCache = cli.command {
        cache.clear()?;
        println!("Cleared validation cache {}", cache.path().display());
        return Ok(ExitCode::SUCCESS);
    }

    let addresses = config.registry_addresses(network)?;
    let orchestrator = Orchestrator::new(provider, config.run_config(network, addresses), cache);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing in-flight batches");
                cancel.cancel();
            }
        }
    });

    let report = match cli.command {
        Commands::ValidateNetworkKeys { fast } => {
            let mode = if fast { RunMode::Fast } else { RunMode::Full };
            orchestrator.run(mode, &cancel).await?
        }
        _ => {
            orchestrator
                .validate_input_keys(inputs.unwrap_or_default(), &cancel)
                .await?
        }
    };

    print!("{}", render::render_report(&report));
    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}
