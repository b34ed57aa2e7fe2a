//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//!   (store → ledger client → wallet → contract → guard → relay)
//! - Bind the listener last, so traffic only arrives when ready
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - An unreachable ledger is not a startup error; the relay reports it per request

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::admission::AdmissionGuard;
use alloy::primitives::Address;

use crate::blockchain::wallet::PRIVATE_KEY_ENV_VAR;
use crate::blockchain::{
    BlockchainError, ContractInterface, Ledger, RpcLedger, TransactionRelay, Wallet,
};
use crate::config::{FaucetConfig, ListenerConfig, StoreBackend, StoreConfig};
use crate::store::{CooldownStore, MemoryStore, RedisStore, SerializedStore, StoreError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cooldown store: {0}")]
    Store(#[from] StoreError),

    #[error("ledger: {0}")]
    Blockchain(#[from] BlockchainError),

    #[error("cannot bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("server: {0}")]
    Server(#[from] std::io::Error),
}

/// The two request-path components, ready to hand to the HTTP server.
#[derive(Debug, Clone)]
pub struct Components {
    pub guard: AdmissionGuard,
    pub relay: Arc<TransactionRelay>,
}

/// Open the configured cooldown store.
pub async fn build_store(config: &StoreConfig) -> Result<Arc<dyn CooldownStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory cooldown store; records are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Redis if config.atomic_script => {
            let store = RedisStore::connect(&config.redis_url).await?;
            tracing::info!("Cooldown store: redis (atomic script)");
            Ok(Arc::new(store))
        }
        StoreBackend::Redis => {
            let store = RedisStore::connect(&config.redis_url).await?;
            tracing::warn!(
                "Cooldown store: redis with per-identity locking; \
                 only correct with a single faucet instance"
            );
            Ok(Arc::new(SerializedStore::new(store)))
        }
    }
}

/// Wire the guard and relay from already-built dependencies.
pub fn assemble(
    config: &FaucetConfig,
    store: Arc<dyn CooldownStore>,
    ledger: Arc<dyn Ledger>,
    wallet: Wallet,
) -> Result<Components, StartupError> {
    let contract = ContractInterface::from_config(&config.blockchain)?;
    let guard = AdmissionGuard::new(store, &config.admission);
    let relay = TransactionRelay::new(
        ledger,
        wallet,
        contract,
        &config.blockchain,
        &config.retries,
    );

    tracing::info!(
        account = %relay.address(),
        cooldown_secs = config.admission.cooldown_secs,
        identity_source = ?config.admission.identity_source,
        "Faucet components ready"
    );

    Ok(Components {
        guard,
        relay: Arc::new(relay),
    })
}

/// Offline checks for `--check`: the signing key parses and the contract
/// interface loads. Returns the custodial account.
///
/// Takes the variable lookup as a closure so tests don't touch the process env.
pub fn preflight<F>(config: &FaucetConfig, lookup: F) -> Result<Address, StartupError>
where
    F: Fn(&str) -> Option<String>,
{
    let key = lookup(PRIVATE_KEY_ENV_VAR).ok_or_else(|| {
        BlockchainError::Wallet(format!(
            "Environment variable {} not set",
            PRIVATE_KEY_ENV_VAR
        ))
    })?;
    let wallet = Wallet::from_private_key(&key, config.blockchain.chain_id)?;
    ContractInterface::from_config(&config.blockchain)?;
    Ok(wallet.address())
}

/// Build every component from configuration and the environment.
pub async fn build_components(config: &FaucetConfig) -> Result<Components, StartupError> {
    let store = build_store(&config.store).await?;
    let ledger = RpcLedger::connect(&config.blockchain).await?;
    let wallet = Wallet::from_env(config.blockchain.chain_id)?;
    assemble(config, store, Arc::new(ledger), wallet)
}

pub async fn bind(config: &ListenerConfig) -> Result<TcpListener, StartupError> {
    let listener = TcpListener::bind(&config.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.bind_address.clone(),
            source,
        })?;

    if let Ok(addr) = listener.local_addr() {
        tracing::info!(address = %addr, "Listening for connections");
    }
    Ok(listener)
}
