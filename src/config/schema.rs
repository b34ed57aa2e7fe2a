//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the faucet.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the faucet relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FaucetConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// HTTP timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Cooldown policy and caller identity derivation.
    pub admission: AdmissionConfig,

    /// Cooldown record store.
    pub store: StoreConfig,

    /// Ledger and custodial transaction settings.
    pub blockchain: BlockchainConfig,

    /// Retry policy for read-only ledger calls.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Timeout configuration for the HTTP surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    ///
    /// Must outlast a full withdrawal: store call, preparation budget,
    /// broadcast and receipt wait.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 180 }
    }
}

/// Where the caller identity used as the cooldown key comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IdentitySource {
    /// Remote socket address of the TCP connection.
    #[default]
    Peer,
    /// First entry of `X-Forwarded-For`, falling back to the peer address.
    ///
    /// Only safe behind a reverse proxy that overwrites the header.
    ForwardedFor,
}

/// Admission (cooldown) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Minimum time between two granted withdrawals per identity, in seconds.
    pub cooldown_secs: u64,

    /// Prefix of the cooldown record key; the identity is appended.
    pub key_prefix: String,

    /// Identity derivation policy.
    pub identity_source: IdentitySource,

    /// Deadline for a single store operation in milliseconds.
    pub store_timeout_ms: u64,

    /// How long a `/validate-ip` grant can be claimed by `/withdraw`, in
    /// seconds. Must not exceed the cooldown.
    pub claim_window_secs: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 24 * 60 * 60,
            key_prefix: "lastWithdrawal:".to_string(),
            identity_source: IdentitySource::Peer,
            store_timeout_ms: 2_000,
            claim_window_secs: 600,
        }
    }
}

/// Cooldown store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBackend {
    /// Process-local map. Single instance only.
    #[default]
    Memory,
    /// Shared Redis server.
    Redis,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Redis connection URL (required for the redis backend).
    pub redis_url: String,

    /// Use a server-side script for check-and-record.
    ///
    /// When false, plain GET/SET is serialized with per-identity locks held
    /// in this process, which is only linearizable for a single instance.
    pub atomic_script: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            atomic_script: true,
        }
    }
}

/// Blockchain integration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs, used for read-only calls only.
    #[serde(default)]
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 1 for Ethereum mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Budget for everything before broadcast, in seconds: fee and gas
    /// reads with their retries, waiting for the submission slot, and the
    /// nonce lookup.
    pub prepare_timeout_secs: u64,

    /// Maximum time to wait for a receipt after broadcast, in seconds.
    pub receipt_timeout_secs: u64,

    /// Receipt polling interval in milliseconds.
    pub receipt_poll_ms: u64,

    /// Gas price multiplier (1.0 = network price, 1.2 = 20% buffer).
    pub gas_price_multiplier: f64,

    /// Gas limit multiplier applied to the estimate.
    pub gas_limit_multiplier: f64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,

    /// Address of the faucet contract.
    pub contract_address: String,

    /// Optional path to the contract's JSON ABI.
    pub abi_path: Option<String>,

    /// Contract method invoked with the destination address.
    pub method: String,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 1,
            rpc_timeout_secs: 10,
            prepare_timeout_secs: 40,
            receipt_timeout_secs: 120,
            receipt_poll_ms: 2_000,
            gas_price_multiplier: 1.0,
            gas_limit_multiplier: 1.0,
            max_gas_price_gwei: 500,
            contract_address: String::new(),
            abi_path: None,
            method: "withdrawTo".to_string(),
        }
    }
}

/// Retry configuration for read-only ledger calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
    /// Enable strict input validation (rejects the zero address).
    pub strict_validation: bool,
    /// Allow cross-origin requests from any origin.
    pub cors_permissive: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 16 * 1024,
            strict_validation: true,
            cors_permissive: true,
        }
    }
}
