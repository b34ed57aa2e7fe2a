//! Shared utilities for integration tests.
//!
//! Starts the faucet on an ephemeral port with an in-memory (or failing)
//! cooldown store and a scripted ledger. No chain or Redis is needed.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, Bytes, TxHash};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;

use faucet_relay::blockchain::{Ledger, LedgerError, LedgerResult, ReceiptStatus, Wallet};
use faucet_relay::config::{FaucetConfig, IdentitySource};
use faucet_relay::lifecycle::{startup, Shutdown};
use faucet_relay::store::{CooldownOutcome, CooldownStore, GrantMode, StoreError, StoreResult};
use faucet_relay::HttpServer;
use sdk_rust::FaucetClient;

/// Anvil's first account.
pub const TEST_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
pub const DESTINATION: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
pub const HOUR_MS: u64 = 60 * 60 * 1000;

/// How the scripted ledger behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerMode {
    Healthy,
    /// Every call fails to connect.
    Unreachable,
    /// Gas estimation is refused (e.g. the contract would revert).
    RejectEstimate,
    /// The broadcast is refused (e.g. insufficient funds).
    RejectBroadcast,
    /// The transaction is included but reverted.
    Revert,
}

pub struct FakeLedger {
    mode: Mutex<LedgerMode>,
    broadcasts: AtomicUsize,
    chain_nonce: AtomicU64,
}

impl FakeLedger {
    pub fn new(mode: LedgerMode) -> Arc<Self> {
        Arc::new(Self {
            mode: Mutex::new(mode),
            broadcasts: AtomicUsize::new(0),
            chain_nonce: AtomicU64::new(0),
        })
    }

    pub fn set_mode(&self, mode: LedgerMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn broadcasts(&self) -> usize {
        self.broadcasts.load(Ordering::SeqCst)
    }

    fn mode(&self) -> LedgerMode {
        *self.mode.lock().unwrap()
    }

    fn reachable(&self) -> LedgerResult<()> {
        match self.mode() {
            LedgerMode::Unreachable => Err(LedgerError::Unreachable(
                "error sending request: connection refused".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Ledger for FakeLedger {
    async fn fee_level(&self) -> LedgerResult<u128> {
        self.reachable()?;
        Ok(1_000_000_000)
    }

    async fn estimate_cost(&self, _call: &TransactionRequest) -> LedgerResult<u64> {
        self.reachable()?;
        match self.mode() {
            LedgerMode::RejectEstimate => {
                Err(LedgerError::Rejected("execution reverted".to_string()))
            }
            _ => Ok(45_000),
        }
    }

    async fn pending_nonce(&self, _account: Address) -> LedgerResult<u64> {
        self.reachable()?;
        Ok(self.chain_nonce.load(Ordering::SeqCst))
    }

    async fn broadcast(&self, _raw: Bytes) -> LedgerResult<TxHash> {
        self.reachable()?;
        match self.mode() {
            LedgerMode::RejectBroadcast => Err(LedgerError::Rejected(
                "insufficient funds for gas * price + value".to_string(),
            )),
            _ => {
                self.broadcasts.fetch_add(1, Ordering::SeqCst);
                self.chain_nonce.fetch_add(1, Ordering::SeqCst);
                Ok(TxHash::ZERO)
            }
        }
    }

    async fn receipt(&self, _tx_hash: TxHash) -> LedgerResult<Option<ReceiptStatus>> {
        self.reachable()?;
        match self.mode() {
            LedgerMode::Revert => Ok(Some(ReceiptStatus::Reverted {
                block_number: Some(2),
            })),
            _ => Ok(Some(ReceiptStatus::Succeeded {
                block_number: Some(1),
            })),
        }
    }

    async fn is_healthy(&self) -> bool {
        self.reachable().is_ok()
    }
}

/// A store whose backend is down.
pub struct DownStore;

#[async_trait]
impl CooldownStore for DownStore {
    async fn check_and_record(
        &self,
        _: &str,
        _: u64,
        _: Duration,
        _: GrantMode,
    ) -> StoreResult<CooldownOutcome> {
        Err(StoreError::Connection("connection refused".to_string()))
    }
}

pub fn test_config() -> FaucetConfig {
    let mut config = FaucetConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.admission.identity_source = IdentitySource::ForwardedFor;
    config.blockchain.chain_id = 31337;
    config.blockchain.contract_address = CONTRACT.to_string();
    config.blockchain.receipt_poll_ms = 10;
    config.blockchain.receipt_timeout_secs = 2;
    config.retries.base_delay_ms = 1;
    config.retries.max_delay_ms = 5;
    config
}

pub struct TestFaucet {
    pub url: String,
    pub ledger: Arc<FakeLedger>,
    shutdown: Shutdown,
}

impl TestFaucet {
    /// Client that presents `identity` through `X-Forwarded-For`.
    pub fn client(&self, identity: &str) -> FaucetClient {
        FaucetClient::new(&self.url).with_forwarded_for(identity)
    }
}

impl Drop for TestFaucet {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn spawn_faucet(store: Arc<dyn CooldownStore>, ledger: Arc<FakeLedger>) -> TestFaucet {
    let config = test_config();
    let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, config.blockchain.chain_id).unwrap();
    let components = startup::assemble(&config, store, ledger.clone(), wallet).unwrap();

    let listener = startup::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config, components.guard, components.relay);
    tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestFaucet {
        url: format!("http://{}", addr),
        ledger,
        shutdown,
    }
}
