use alloy_primitives::Address;
use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use config::{Config, Environment, File as ConfigFile};
use keycheck_core::RunConfig;
use keycheck_registry::RegistryAddresses;
use keycheck_rpc::{BatchConfig, RetryPolicy, MULTICALL3_ADDRESS};
use keycheck_types::Network;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Settings given on the command line. They win over the environment and
/// the configuration file.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// JSON-RPC endpoint URL
    #[arg(long = "rpc", global = true)]
    pub rpc_url: Option<String>,
    /// Network name (mainnet, goerli, sepolia, holesky, hoodi)
    #[arg(long, global = true)]
    pub network: Option<String>,
    /// Staking pool contract address
    #[arg(long, global = true)]
    pub lido_address: Option<String>,
    /// Node operator registry contract address
    #[arg(long, global = true)]
    pub registry_address: Option<String>,
    /// Multicall3 address, or "none" to issue calls individually
    #[arg(long, global = true)]
    pub multicall_address: Option<String>,
    /// Calls per aggregated request
    #[arg(long, global = true)]
    pub max_multicall: Option<usize>,
    /// Concurrent batch workers
    #[arg(long, global = true)]
    pub max_workers: Option<usize>,
    /// Retries per failed batch
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,
    /// Directory holding the validation cache
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,
    /// Log level, unless RUST_LOG is set
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Endpoint
    pub rpc_url: String,
    pub network: Option<Network>,

    // Contracts
    pub lido_address: Option<Address>,
    pub registry_address: Option<Address>,
    pub multicall_address: Option<Address>,

    // Batching
    pub max_multicall: usize,
    pub max_workers: usize,
    pub max_retries: u32,
    pub call_timeout_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,

    // Storage
    pub cache_dir: PathBuf,

    // Logging
    pub log_level: String,
    pub log_format: String,
}

impl AppConfig {
    /// Resolve the configuration file, `KEYCHECK_*` variables and command
    /// line overrides, in increasing priority.
    pub fn load(config_path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = config_path {
            if !path.exists() {
                bail!(
                    "Configuration file {} not found (specified via --config)",
                    path.display()
                );
            }
            builder = builder.add_source(ConfigFile::from(path));
        }

        builder = builder.add_source(Environment::with_prefix("KEYCHECK"));

        let config = builder.build()?;
        Self::from_sources(&config, overrides)
    }

    pub fn from_sources(config: &Config, overrides: &Overrides) -> Result<Self> {
        let rpc_url = overrides
            .rpc_url
            .clone()
            .or_else(|| get_string_value(config, "rpc_url"))
            .ok_or_else(|| anyhow!("no RPC endpoint configured (use --rpc or KEYCHECK_RPC_URL)"))?;

        let network = overrides
            .network
            .clone()
            .or_else(|| get_string_value(config, "network"))
            .map(|name| Network::from_str(&name).map_err(|e| anyhow!(e)))
            .transpose()?;

        let lido_address = overrides
            .lido_address
            .clone()
            .or_else(|| get_string_value(config, "lido_address"))
            .map(|value| parse_address("lido_address", &value))
            .transpose()?;
        let registry_address = overrides
            .registry_address
            .clone()
            .or_else(|| get_string_value(config, "registry_address"))
            .map(|value| parse_address("registry_address", &value))
            .transpose()?;
        let multicall_address = match overrides
            .multicall_address
            .clone()
            .or_else(|| get_string_value(config, "multicall_address"))
        {
            None => Some(MULTICALL3_ADDRESS),
            Some(value) if value.eq_ignore_ascii_case("none") => None,
            Some(value) => Some(parse_address("multicall_address", &value)?),
        };

        let cache_dir = match overrides
            .cache_dir
            .clone()
            .or_else(|| get_string_value(config, "cache_dir").map(PathBuf::from))
        {
            Some(dir) => dir,
            None => dirs::home_dir().ok_or_else(|| {
                anyhow!("cannot determine home directory, set --cache-dir or KEYCHECK_CACHE_DIR")
            })?,
        };

        let app = Self {
            rpc_url,
            network,
            lido_address,
            registry_address,
            multicall_address,
            max_multicall: pick(overrides.max_multicall, config, "max_multicall", 100)?,
            max_workers: pick(overrides.max_workers, config, "max_workers", 4)?,
            max_retries: pick(overrides.max_retries, config, "max_retries", 3)?,
            call_timeout_ms: pick(None, config, "call_timeout_ms", 20_000)?,
            backoff_base_ms: pick(None, config, "backoff_base_ms", 250)?,
            backoff_max_ms: pick(None, config, "backoff_max_ms", 8_000)?,
            cache_dir,
            log_level: overrides
                .log_level
                .clone()
                .or_else(|| get_string_value(config, "log_level"))
                .unwrap_or_else(|| "info".to_string()),
            log_format: get_string_value(config, "log_format")
                .unwrap_or_else(|| "pretty".to_string()),
        };

        if app.max_multicall == 0 || app.max_workers == 0 {
            bail!("max_multicall and max_workers must be positive");
        }
        Ok(app)
    }

    /// Pick the network, checking it against the endpoint's chain id.
    pub fn resolve_network(&self, chain_id: u64) -> Result<Network> {
        match self.network {
            Some(network) if network.chain_id() != chain_id => bail!(
                "network {network} has chain id {}, but the endpoint reports {chain_id}",
                network.chain_id()
            ),
            Some(network) => Ok(network),
            None => Network::from_chain_id(chain_id)
                .ok_or_else(|| anyhow!("unsupported chain id {chain_id}, set --network explicitly")),
        }
    }

    pub fn registry_addresses(&self, network: Network) -> Result<RegistryAddresses> {
        let defaults = RegistryAddresses::for_network(network);
        let lido = self
            .lido_address
            .or(defaults.map(|d| d.lido))
            .with_context(|| format!("no staking pool address known for {network}, set --lido-address"))?;
        let registry = self
            .registry_address
            .or(defaults.map(|d| d.registry))
            .with_context(|| {
                format!("no registry address known for {network}, set --registry-address")
            })?;
        Ok(RegistryAddresses::new(lido, registry))
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            batch_size: self.max_multicall,
            max_workers: self.max_workers,
            retry: RetryPolicy {
                max_retries: self.max_retries,
                base_delay: Duration::from_millis(self.backoff_base_ms),
                max_delay: Duration::from_millis(self.backoff_max_ms),
            },
            call_timeout: Duration::from_millis(self.call_timeout_ms),
        }
    }

    pub fn run_config(&self, network: Network, addresses: RegistryAddresses) -> RunConfig {
        RunConfig::new(network, addresses).with_batch(self.batch_config())
    }
}

fn get_string_value(config: &Config, key: &str) -> Option<String> {
    config
        .get_string(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn pick<T>(explicit: Option<T>, config: &Config, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(value) = explicit {
        return Ok(value);
    }
    match get_string_value(config, key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow!("invalid value {raw:?} for {key}: {e}")),
        None => Ok(default),
    }
}

fn parse_address(key: &str, value: &str) -> Result<Address> {
    Address::from_str(value.trim()).with_context(|| format!("invalid address {value:?} for {key}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;
    use std::collections::HashMap;

    fn build(toml: &str, env: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::builder()
            .add_source(ConfigFile::from_str(toml, FileFormat::Toml))
            .add_source(Environment::with_prefix("KEYCHECK").source(Some(env)))
            .build()
            .unwrap()
    }

    fn with_cache_dir() -> Overrides {
        Overrides {
            cache_dir: Some(PathBuf::from("/tmp/keycheck")),
            ..Overrides::default()
        }
    }

    #[test]
    fn defaults_apply() {
        let config = build(r#"rpc_url = "http://localhost:8545""#, &[]);
        let app = AppConfig::from_sources(&config, &with_cache_dir()).unwrap();

        assert_eq!(app.rpc_url, "http://localhost:8545");
        assert_eq!(app.network, None);
        assert_eq!(app.multicall_address, Some(MULTICALL3_ADDRESS));
        assert_eq!(app.max_multicall, 100);
        assert_eq!(app.max_workers, 4);
        assert_eq!(app.max_retries, 3);
        assert_eq!(app.call_timeout_ms, 20_000);
        assert_eq!(app.log_level, "info");
        assert_eq!(app.log_format, "pretty");
        assert_eq!(app.batch_config().retry.base_delay, Duration::from_millis(250));
    }

    #[test]
    fn environment_beats_file_and_flags_beat_environment() {
        let config = build(
            "rpc_url = \"http://file\"\nmax_workers = 2\nmax_retries = 7\n",
            &[("KEYCHECK_MAX_WORKERS", "6"), ("KEYCHECK_RPC_URL", "http://env")],
        );
        let overrides = Overrides {
            rpc_url: Some("http://flag".into()),
            ..with_cache_dir()
        };
        let app = AppConfig::from_sources(&config, &overrides).unwrap();

        assert_eq!(app.rpc_url, "http://flag");
        assert_eq!(app.max_workers, 6);
        assert_eq!(app.max_retries, 7);
    }

    #[test]
    fn missing_endpoint_is_an_error() {
        let config = build("", &[]);
        assert!(AppConfig::from_sources(&config, &with_cache_dir()).is_err());
    }

    #[test]
    fn multicall_can_be_disabled() {
        let config = build("rpc_url = \"http://x\"\nmulticall_address = \"none\"\n", &[]);
        let app = AppConfig::from_sources(&config, &with_cache_dir()).unwrap();
        assert_eq!(app.multicall_address, None);
    }

    #[test]
    fn network_must_match_chain_id() {
        let config = build("rpc_url = \"http://x\"\nnetwork = \"holesky\"\n", &[]);
        let app = AppConfig::from_sources(&config, &with_cache_dir()).unwrap();

        assert_eq!(app.resolve_network(17_000).unwrap(), Network::Holesky);
        assert!(app.resolve_network(1).is_err());
    }

    #[test]
    fn network_defaults_to_chain_id() {
        let config = build("rpc_url = \"http://x\"\n", &[]);
        let app = AppConfig::from_sources(&config, &with_cache_dir()).unwrap();

        assert_eq!(app.resolve_network(1).unwrap(), Network::Mainnet);
        assert!(app.resolve_network(31_337).is_err());
    }

    #[test]
    fn registry_addresses_need_a_deployment_or_explicit_values() {
        let config = build("rpc_url = \"http://x\"\n", &[]);
        let app = AppConfig::from_sources(&config, &with_cache_dir()).unwrap();
        assert!(app.registry_addresses(Network::Mainnet).is_ok());
        assert!(app.registry_addresses(Network::Hoodi).is_err());

        let overrides = Overrides {
            lido_address: Some("0x1111111111111111111111111111111111111111".into()),
            registry_address: Some("0x2222222222222222222222222222222222222222".into()),
            ..with_cache_dir()
        };
        let app = AppConfig::from_sources(&config, &overrides).unwrap();
        let addresses = app.registry_addresses(Network::Hoodi).unwrap();
        assert_eq!(addresses.registry, Address::repeat_byte(0x22));
    }

    #[test]
    fn bad_numbers_are_reported() {
        let config = build("rpc_url = \"http://x\"\nmax_multicall = \"lots\"\n", &[]);
        let err = AppConfig::from_sources(&config, &with_cache_dir()).unwrap_err();
        assert!(err.to_string().contains("max_multicall"));
    }
}
