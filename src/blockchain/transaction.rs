//! The relay pipeline: fee, estimate, sign, broadcast, receipt.
//!
//! # Responsibilities
//! - Price and size the contract call from the ledger
//! - Assign nonces and broadcast one submission at a time
//! - Wait for the receipt and report the outcome
//!
//! # Failure Mapping
//! ```text
//! fee / estimate / nonce / sign / fee cap  → EstimationFailed (retried if transient)
//!     ...ledger unreachable throughout     → NetworkUnavailable, no hash
//! broadcast rejected                       → SubmissionFailed
//! broadcast unreachable or timed out       → NetworkUnavailable, with hash
//! revert / no receipt / lookup error       → SubmissionFailed, with hash
//! ```
//! The broadcast itself is never retried here.
//!
//! Everything before broadcast, including the wait for the submission slot,
//! runs under `prepare_timeout_secs`. Once the bytes are handed to the node
//! only the broadcast deadline and the receipt timeout remain, so the total
//! is bounded by config validation's withdrawal budget.

use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, TxHash};
use alloy::rpc::types::TransactionRequest;
use tokio::sync::{Mutex, MutexGuard};

use crate::blockchain::contract::ContractInterface;
use crate::blockchain::ledger::Ledger;
use crate::blockchain::types::{LedgerError, ReceiptStatus, RelayError, GWEI};
use crate::blockchain::wallet::{NonceLease, SignedTransaction, Wallet};
use crate::config::{BlockchainConfig, RetryConfig};
use crate::observability::metrics;
use crate::resilience::{retry_read_only, with_deadline, Deadline};

/// Read-only failures before broadcast.
fn estimation_error(stage: &str, e: LedgerError) -> RelayError {
    if e.is_connectivity() {
        RelayError::NetworkUnavailable {
            reason: format!("{stage}: {e}"),
            tx_hash: None,
        }
    } else {
        RelayError::EstimationFailed(format!("{stage}: {e}"))
    }
}

/// A signed transaction holding the submission slot.
struct Prepared<'a> {
    _slot: MutexGuard<'a, ()>,
    lease: NonceLease,
    signed: SignedTransaction,
}

fn scale(value: u128, multiplier: f64) -> u128 {
    (value as f64 * multiplier).ceil() as u128
}

/// Submits faucet withdrawals from the custodial account.
pub struct TransactionRelay {
    ledger: Arc<dyn Ledger>,
    wallet: Wallet,
    contract: ContractInterface,
    config: BlockchainConfig,
    retries: RetryConfig,
    /// Held from nonce assignment through broadcast.
    submit_lock: Mutex<()>,
}

impl TransactionRelay {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        wallet: Wallet,
        contract: ContractInterface,
        config: &BlockchainConfig,
        retries: &RetryConfig,
    ) -> Self {
        Self {
            ledger,
            wallet,
            contract,
            config: config.clone(),
            retries: retries.clone(),
            submit_lock: Mutex::new(()),
        }
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// Custodial account address.
    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Relay a withdrawal to `destination` and wait for its receipt.
    pub async fn submit(&self, destination: Address) -> Result<TxHash, RelayError> {
        let started = Instant::now();
        let result = self.relay(destination).await;

        match &result {
            Ok(tx_hash) => {
                tracing::info!(destination = %destination, tx_hash = %tx_hash, "Withdrawal relayed");
                metrics::record_relay_outcome("success", started);
            }
            Err(e) => {
                tracing::warn!(
                    destination = %destination,
                    kind = e.kind(),
                    tx_hash = ?e.tx_hash(),
                    error = %e,
                    "Withdrawal relay failed"
                );
                metrics::record_relay_outcome(e.kind(), started);
            }
        }

        result
    }

    async fn relay(&self, destination: Address) -> Result<TxHash, RelayError> {
        let budget = Duration::from_secs(self.config.prepare_timeout_secs);
        let prepared = match with_deadline(budget, self.prepare(destination)).await {
            Ok(prepared) => prepared,
            Err(Deadline::Failed(e)) => return Err(e),
            Err(Deadline::Elapsed(limit)) => {
                return Err(RelayError::NetworkUnavailable {
                    reason: format!("not ready to broadcast within {limit:?}"),
                    tx_hash: None,
                })
            }
        };

        let nonce = prepared.lease.nonce();
        let tx_hash = self.broadcast(prepared).await?;
        self.await_receipt(tx_hash, nonce).await
    }

    /// Fee and gas, then the submission slot, nonce and signature.
    async fn prepare(&self, destination: Address) -> Result<Prepared<'_>, RelayError> {
        let input = self
            .contract
            .encode_call(destination)
            .map_err(|e| RelayError::EstimationFailed(e.to_string()))?;

        let call = TransactionRequest::default()
            .with_from(self.wallet.address())
            .with_to(self.contract.address())
            .with_input(input);

        let gas_price = self.fee_level().await?;
        let gas_limit = self.estimate(&call).await?;
        let tx = call.with_gas_price(gas_price).with_gas_limit(gas_limit);

        let slot = self.submit_lock.lock().await;

        let account = self.wallet.address();
        let chain_pending = retry_read_only(&self.retries, "pending_nonce", || {
            self.ledger.pending_nonce(account)
        })
        .await
        .map_err(|e| estimation_error("nonce lookup", e))?;

        let lease = self.wallet.reserve_nonce(chain_pending);
        let signed = self
            .wallet
            .sign_transaction(tx.with_nonce(lease.nonce()))
            .await
            .map_err(|e| RelayError::EstimationFailed(e.to_string()))?;

        Ok(Prepared {
            _slot: slot,
            lease,
            signed,
        })
    }

    /// Network gas price with multiplier, bounded by the configured cap.
    async fn fee_level(&self) -> Result<u128, RelayError> {
        let network = retry_read_only(&self.retries, "fee_level", || self.ledger.fee_level())
            .await
            .map_err(|e| estimation_error("fee level", e))?;

        let adjusted = scale(network, self.config.gas_price_multiplier);
        let cap = u128::from(self.config.max_gas_price_gwei) * GWEI;
        if adjusted > cap {
            return Err(RelayError::EstimationFailed(format!(
                "gas price {} gwei exceeds maximum {} gwei",
                adjusted / GWEI,
                self.config.max_gas_price_gwei
            )));
        }

        Ok(adjusted)
    }

    async fn estimate(&self, call: &TransactionRequest) -> Result<u64, RelayError> {
        let estimate = retry_read_only(&self.retries, "estimate_cost", || {
            self.ledger.estimate_cost(call)
        })
        .await
        .map_err(|e| estimation_error("gas estimate", e))?;

        let limit = scale(u128::from(estimate), self.config.gas_limit_multiplier);
        u64::try_from(limit)
            .map_err(|_| RelayError::EstimationFailed(format!("gas limit {limit} out of range")))
    }

    /// Releases the submission slot on return.
    async fn broadcast(&self, prepared: Prepared<'_>) -> Result<TxHash, RelayError> {
        let Prepared {
            _slot,
            lease,
            signed,
        } = prepared;

        tracing::debug!(tx_hash = %signed.tx_hash, nonce = lease.nonce(), "Broadcasting transaction");

        match self.ledger.broadcast(signed.raw).await {
            Ok(_) => {
                lease.commit();
                Ok(signed.tx_hash)
            }
            Err(LedgerError::Rejected(reason)) => Err(RelayError::SubmissionFailed {
                reason,
                tx_hash: Some(signed.tx_hash),
            }),
            Err(e) => Err(RelayError::NetworkUnavailable {
                reason: e.to_string(),
                tx_hash: Some(signed.tx_hash),
            }),
        }
    }

    async fn await_receipt(&self, tx_hash: TxHash, nonce: u64) -> Result<TxHash, RelayError> {
        let limit = Duration::from_secs(self.config.receipt_timeout_secs);
        let poll = Duration::from_millis(self.config.receipt_poll_ms);

        match self.ledger.wait_for_receipt(tx_hash, limit, poll).await {
            Ok(ReceiptStatus::Succeeded { block_number }) => {
                tracing::debug!(tx_hash = %tx_hash, block_number = ?block_number, "Receipt received");
                Ok(tx_hash)
            }
            Ok(ReceiptStatus::Reverted { .. }) => Err(RelayError::SubmissionFailed {
                reason: "transaction reverted".to_string(),
                tx_hash: Some(tx_hash),
            }),
            Err(e) => {
                if self.wallet.release_stuck_nonce(nonce) {
                    tracing::warn!(tx_hash = %tx_hash, nonce, "No receipt; next nonce comes from the chain");
                }
                Err(RelayError::SubmissionFailed {
                    reason: format!("no receipt: {e}"),
                    tx_hash: Some(tx_hash),
                })
            }
        }
    }
}

impl std::fmt::Debug for TransactionRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionRelay")
            .field("account", &self.wallet.address())
            .field("contract", &self.contract.address())
            .finish_non_exhaustive()
    }
}
