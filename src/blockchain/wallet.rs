//! Custodial account: key loading, signing and nonce tracking.
//!
//! # Security
//! - The private key is loaded ONLY from the environment
//! - Keys are never logged or serialized
//! - Raw key bytes are not kept outside the signer

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;

use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// Environment variable name for the private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "FAUCET_PRIVATE_KEY";

/// A signed transaction ready for broadcast.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub tx_hash: TxHash,
    pub raw: Bytes,
}

/// Wallet for transaction signing with nonce management.
///
/// Clones share the nonce counter.
#[derive(Clone)]
pub struct Wallet {
    address: Address,
    signer: EthereumWallet,
    /// Next nonce to hand out; 0 means "ask the chain".
    next_nonce: Arc<AtomicU64>,
    /// Chain ID for EIP-155 replay protection.
    chain_id: u64,
}

impl Wallet {
    /// Create a wallet from a hex-encoded private key string.
    ///
    /// # Arguments
    /// * `private_key_hex` - Hex string (with or without 0x prefix)
    /// * `chain_id` - Chain ID for transaction signing
    pub fn from_private_key(private_key_hex: &str, chain_id: u64) -> BlockchainResult<Self> {
        let key_hex = private_key_hex
            .trim()
            .strip_prefix("0x")
            .unwrap_or(private_key_hex.trim());

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| BlockchainError::Wallet(format!("Invalid private key format: {}", e)))?;
        let address = signer.address();

        tracing::info!(address = %address, chain_id = chain_id, "Wallet initialized");

        Ok(Self {
            address,
            signer: EthereumWallet::from(signer),
            next_nonce: Arc::new(AtomicU64::new(0)),
            chain_id,
        })
    }

    /// Load wallet from environment variable.
    ///
    /// Reads `FAUCET_PRIVATE_KEY` from environment.
    pub fn from_env(chain_id: u64) -> BlockchainResult<Self> {
        let private_key = std::env::var(PRIVATE_KEY_ENV_VAR).map_err(|_| {
            BlockchainError::Wallet(format!(
                "Environment variable {} not set",
                PRIVATE_KEY_ENV_VAR
            ))
        })?;

        Self::from_private_key(&private_key, chain_id)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Reserve the next nonce, never going below the chain's pending nonce.
    ///
    /// Callers must serialize reservations. The lease forgets the local
    /// counter on drop unless committed, so a failed or cancelled broadcast
    /// resynchronizes from the chain next time.
    pub fn reserve_nonce(&self, chain_pending: u64) -> NonceLease {
        self.next_nonce.fetch_max(chain_pending, Ordering::SeqCst);
        let nonce = self.next_nonce.fetch_add(1, Ordering::SeqCst);
        NonceLease {
            counter: self.next_nonce.clone(),
            nonce,
            committed: false,
        }
    }

    /// Forget the local counter if `nonce` is still the latest handed out.
    ///
    /// For a broadcast that never produced a receipt: the chain may never
    /// have seen it. A later nonce still in flight releases the counter
    /// itself if it gets stuck too; if it succeeds, `nonce` was mined.
    pub fn release_stuck_nonce(&self, nonce: u64) -> bool {
        self.next_nonce
            .compare_exchange(nonce.saturating_add(1), 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Next locally tracked nonce (0 when unknown).
    pub fn current_nonce(&self) -> u64 {
        self.next_nonce.load(Ordering::SeqCst)
    }

    /// Sign a fully populated transaction request.
    pub async fn sign_transaction(
        &self,
        tx: TransactionRequest,
    ) -> BlockchainResult<SignedTransaction> {
        let envelope = tx
            .with_from(self.address)
            .with_chain_id(self.chain_id)
            .build(&self.signer)
            .await
            .map_err(|e| BlockchainError::Signing(e.to_string()))?;

        Ok(SignedTransaction {
            tx_hash: *envelope.tx_hash(),
            raw: Bytes::from(envelope.encoded_2718()),
        })
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

/// A nonce handed out for one submission.
#[derive(Debug)]
pub struct NonceLease {
    counter: Arc<AtomicU64>,
    nonce: u64,
    committed: bool,
}

impl NonceLease {
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Keep the local counter: the network accepted this nonce.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for NonceLease {
    fn drop(&mut self) {
        if !self.committed {
            self.counter.store(0, Ordering::SeqCst);
        }
    }
}
