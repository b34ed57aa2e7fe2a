//! The ledger seam the relay is written against.

use std::time::Duration;

use alloy::primitives::{Address, Bytes, TxHash};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::blockchain::types::{LedgerError, LedgerResult, ReceiptStatus};

/// Operations the relay needs from the ledger network.
///
/// Everything except `broadcast` is read-only.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Current gas price in wei.
    async fn fee_level(&self) -> LedgerResult<u128>;

    /// Gas the call would consume.
    async fn estimate_cost(&self, call: &TransactionRequest) -> LedgerResult<u64>;

    /// Next nonce for `account`, counting pending transactions.
    async fn pending_nonce(&self, account: Address) -> LedgerResult<u64>;

    /// Hand signed EIP-2718 bytes to the network.
    async fn broadcast(&self, raw: Bytes) -> LedgerResult<TxHash>;

    /// Receipt status, or `None` while the transaction is pending.
    async fn receipt(&self, tx_hash: TxHash) -> LedgerResult<Option<ReceiptStatus>>;

    async fn is_healthy(&self) -> bool;

    /// Poll `receipt` until it appears or `limit` elapses.
    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        limit: Duration,
        poll: Duration,
    ) -> LedgerResult<ReceiptStatus> {
        let result = timeout(limit, async {
            let mut ticker = interval(poll);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                match self.receipt(tx_hash).await {
                    Ok(Some(status)) => return Ok(status),
                    Ok(None) => tracing::debug!(tx_hash = %tx_hash, "Transaction pending"),
                    Err(e) if e.is_connectivity() => {
                        tracing::warn!(tx_hash = %tx_hash, error = %e, "Receipt lookup failed, polling again");
                    }
                    Err(e) => return Err(e),
                }
            }
        })
        .await;

        match result {
            Ok(status) => status,
            Err(_) => Err(LedgerError::Timeout(limit)),
        }
    }
}
