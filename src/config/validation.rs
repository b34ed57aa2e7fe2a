//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, multipliers >= 1.0)
//! - Check cross-field constraints (HTTP deadline outlasts a withdrawal)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: FaucetConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::time::Duration;

use alloy::primitives::Address;
use thiserror::Error;

use crate::config::schema::{FaucetConfig, StoreBackend};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("blockchain.rpc_url must not be empty")]
    EmptyRpcUrl,

    #[error("blockchain.contract_address '{0}' is not a valid address")]
    ContractAddress(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{field} must be at least 1.0 (got {value})")]
    Multiplier { field: &'static str, value: f64 },

    #[error("store.redis_url is required for the redis backend")]
    MissingRedisUrl,

    #[error("admission.claim_window_secs ({claim_secs}) must not exceed the cooldown ({cooldown_secs})")]
    ClaimWindow { claim_secs: u64, cooldown_secs: u64 },

    #[error(
        "timeouts.request_secs ({request_secs}) must exceed the withdrawal budget \
         of {budget_ms} ms (store + prepare + rpc + receipt timeouts)"
    )]
    RequestDeadline { request_secs: u64, budget_ms: u128 },
}

/// Longest a withdrawal can run once the handler starts.
///
/// The store call and everything before broadcast carry their own
/// deadlines; broadcast is one primary RPC call, then the receipt wait.
pub fn withdrawal_budget(config: &FaucetConfig) -> Duration {
    let chain = &config.blockchain;
    Duration::from_millis(config.admission.store_timeout_ms)
        .saturating_add(Duration::from_secs(chain.prepare_timeout_secs))
        .saturating_add(Duration::from_secs(chain.rpc_timeout_secs))
        .saturating_add(Duration::from_secs(chain.receipt_timeout_secs))
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &FaucetConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let chain = &config.blockchain;
    if chain.rpc_url.trim().is_empty() {
        errors.push(ValidationError::EmptyRpcUrl);
    }
    if chain.contract_address.parse::<Address>().is_err() {
        errors.push(ValidationError::ContractAddress(
            chain.contract_address.clone(),
        ));
    }

    let positive = [
        ("admission.cooldown_secs", config.admission.cooldown_secs),
        ("admission.store_timeout_ms", config.admission.store_timeout_ms),
        ("admission.claim_window_secs", config.admission.claim_window_secs),
        ("blockchain.rpc_timeout_secs", chain.rpc_timeout_secs),
        ("blockchain.prepare_timeout_secs", chain.prepare_timeout_secs),
        ("blockchain.receipt_timeout_secs", chain.receipt_timeout_secs),
        ("blockchain.receipt_poll_ms", chain.receipt_poll_ms),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("retries.max_attempts", u64::from(config.retries.max_attempts)),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    for (field, value) in [
        ("blockchain.gas_price_multiplier", chain.gas_price_multiplier),
        ("blockchain.gas_limit_multiplier", chain.gas_limit_multiplier),
    ] {
        if !(value >= 1.0) {
            errors.push(ValidationError::Multiplier { field, value });
        }
    }

    if config.store.backend == StoreBackend::Redis && config.store.redis_url.trim().is_empty() {
        errors.push(ValidationError::MissingRedisUrl);
    }

    if config.admission.claim_window_secs > config.admission.cooldown_secs {
        errors.push(ValidationError::ClaimWindow {
            claim_secs: config.admission.claim_window_secs,
            cooldown_secs: config.admission.cooldown_secs,
        });
    }

    let budget = withdrawal_budget(config);
    if Duration::from_secs(config.timeouts.request_secs) <= budget {
        errors.push(ValidationError::RequestDeadline {
            request_secs: config.timeouts.request_secs,
            budget_ms: budget.as_millis(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
