//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, .env + environment overrides)
//!       (.env is loaded by the caller, before the config file)
//!     → validation.rs (semantic checks)
//!     → FaucetConfig (validated, immutable)
//!     → handed to lifecycle::startup, which builds every subsystem from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - The custodial private key is never part of the config file

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_env_file, ConfigError};
pub use schema::{
    AdmissionConfig, BlockchainConfig, FaucetConfig, IdentitySource, ListenerConfig, LogFormat,
    ObservabilityConfig, RetryConfig, SecurityConfig, StoreBackend, StoreConfig, TimeoutConfig,
};
