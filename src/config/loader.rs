//! Configuration loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::FaucetConfig;
use crate::config::validation::{validate_config, ValidationError};

pub const BIND_ADDRESS_ENV_VAR: &str = "FAUCET_BIND_ADDRESS";
pub const RPC_URL_ENV_VAR: &str = "FAUCET_RPC_URL";
pub const CONTRACT_ADDRESS_ENV_VAR: &str = "FAUCET_CONTRACT_ADDRESS";
pub const REDIS_URL_ENV_VAR: &str = "FAUCET_REDIS_URL";
pub const CHAIN_ID_ENV_VAR: &str = "FAUCET_CHAIN_ID";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { var: &'static str, reason: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, reason } => write!(f, "Invalid {}: {}", var, reason),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse a TOML file without validating it.
pub fn read_config_file(path: &Path) -> Result<FaucetConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Apply overrides from a variable lookup.
///
/// Takes the lookup as a closure so tests don't touch the process env.
pub fn apply_overrides<F>(config: &mut FaucetConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup(BIND_ADDRESS_ENV_VAR) {
        config.listener.bind_address = v;
    }
    if let Some(v) = lookup(RPC_URL_ENV_VAR) {
        config.blockchain.rpc_url = v;
    }
    if let Some(v) = lookup(CONTRACT_ADDRESS_ENV_VAR) {
        config.blockchain.contract_address = v;
    }
    if let Some(v) = lookup(REDIS_URL_ENV_VAR) {
        config.store.redis_url = v;
    }
    if let Some(v) = lookup(CHAIN_ID_ENV_VAR) {
        config.blockchain.chain_id = v.trim().parse().map_err(|e| ConfigError::Env {
            var: CHAIN_ID_ENV_VAR,
            reason: format!("{}", e),
        })?;
    }
    Ok(())
}

/// Load `.env` into the process environment.
///
/// Runs before logging exists, so the caller reports the result. A missing
/// file is normal in production.
pub fn load_env_file() -> Result<PathBuf, dotenv::Error> {
    dotenv::dotenv()
}

/// Load configuration: optional TOML file, then process environment
/// overrides, then validation. Call [`load_env_file`] first for `.env`.
pub fn load_config(path: Option<&Path>) -> Result<FaucetConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => FaucetConfig::default(),
    };

    apply_overrides(&mut config, |var| std::env::var(var).ok())?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
