//! JSON-RPC ledger client with timeout and failover.
//!
//! # Responsibilities
//! - Connect to the primary JSON-RPC endpoint and any failovers
//! - Answer read-only queries from the first provider that responds
//! - Broadcast through the primary provider only
//! - Classify transport failures as unreachable, rejected or timed out

use std::future::Future;
use std::time::Duration;

use alloy::eips::BlockId;
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::TransportError;
use async_trait::async_trait;

use crate::blockchain::ledger::Ledger;
use crate::blockchain::types::{
    BlockchainError, BlockchainResult, LedgerError, LedgerResult, ReceiptStatus,
};
use crate::config::BlockchainConfig;
use crate::observability::metrics;
use crate::resilience::{with_deadline, Deadline, Retryable};

fn connect_provider(url: &str) -> BlockchainResult<DynProvider> {
    let parsed: url::Url = url.parse().map_err(|e: url::ParseError| BlockchainError::InvalidRpcUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    Ok(ProviderBuilder::new().connect_http(parsed).erased())
}

/// Ledger client over HTTP JSON-RPC.
#[derive(Clone)]
pub struct RpcLedger {
    primary: DynProvider,
    failovers: Vec<DynProvider>,
    rpc_url: String,
    chain_id: u64,
    timeout_duration: Duration,
}

impl RpcLedger {
    /// Build the client and check the chain ID.
    ///
    /// An unreachable endpoint or a chain mismatch is logged, not fatal, so the
    /// service can start while the node is still coming up.
    pub async fn connect(config: &BlockchainConfig) -> BlockchainResult<Self> {
        let primary = connect_provider(&config.rpc_url)?;

        let mut failovers = Vec::new();
        for url in &config.failover_urls {
            match connect_provider(url) {
                Ok(provider) => failovers.push(provider),
                Err(e) => tracing::warn!(error = %e, "Ignoring invalid failover RPC URL"),
            }
        }

        let ledger = Self {
            primary,
            failovers,
            rpc_url: config.rpc_url.clone(),
            chain_id: config.chain_id,
            timeout_duration: Duration::from_secs(config.rpc_timeout_secs),
        };

        match ledger.verify_chain_id().await {
            Ok(()) => tracing::info!(
                rpc_url = %config.rpc_url,
                chain_id = config.chain_id,
                failovers = ledger.failovers.len(),
                "Ledger client initialized"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                "Ledger client initialized but chain verification failed"
            ),
        }

        Ok(ledger)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> Result<(), ChainCheckError> {
        let actual = self
            .read("chain_id", |p| async move { p.get_chain_id().await })
            .await?;
        if actual != self.chain_id {
            return Err(BlockchainError::ChainMismatch {
                expected: self.chain_id,
                actual,
            }
            .into());
        }
        Ok(())
    }

    /// Run a read-only call against each provider in turn.
    ///
    /// A rejection is final: every provider would answer the same way.
    async fn read<T, F, Fut>(&self, operation: &'static str, call: F) -> LedgerResult<T>
    where
        F: Fn(DynProvider) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut last = LedgerError::Unreachable("no providers configured".to_string());

        let providers = std::iter::once(&self.primary).chain(self.failovers.iter());
        for (idx, provider) in providers.enumerate() {
            match with_deadline(self.timeout_duration, call(provider.clone())).await {
                Ok(value) => return Ok(value),
                Err(Deadline::Failed(e)) => {
                    let err = LedgerError::from(e);
                    if !err.is_retryable() {
                        return Err(err);
                    }
                    tracing::warn!(provider_idx = idx, operation, error = %err, "RPC error, trying next provider");
                    last = err;
                }
                Err(Deadline::Elapsed(limit)) => {
                    tracing::warn!(provider_idx = idx, operation, "RPC timeout, trying next provider");
                    last = LedgerError::Timeout(limit);
                }
            }
        }

        Err(last)
    }
}

/// Why the startup chain check did not pass.
#[derive(Debug, thiserror::Error)]
pub enum ChainCheckError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Mismatch(#[from] BlockchainError),
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn fee_level(&self) -> LedgerResult<u128> {
        self.read("fee_level", |p| async move { p.get_gas_price().await })
            .await
    }

    async fn estimate_cost(&self, call: &TransactionRequest) -> LedgerResult<u64> {
        self.read("estimate_cost", |p| {
            let call = call.clone();
            async move { p.estimate_gas(call).await }
        })
        .await
    }

    async fn pending_nonce(&self, account: Address) -> LedgerResult<u64> {
        self.read("pending_nonce", |p| async move {
            p.get_transaction_count(account)
                .block_id(BlockId::pending())
                .await
        })
        .await
    }

    async fn broadcast(&self, raw: Bytes) -> LedgerResult<TxHash> {
        let send = async {
            self.primary
                .send_raw_transaction(&raw)
                .await
                .map(|pending| *pending.tx_hash())
        };
        match with_deadline(self.timeout_duration, send).await {
            Ok(tx_hash) => Ok(tx_hash),
            Err(Deadline::Failed(e)) => Err(LedgerError::from(e)),
            Err(Deadline::Elapsed(limit)) => Err(LedgerError::Timeout(limit)),
        }
    }

    async fn receipt(&self, tx_hash: TxHash) -> LedgerResult<Option<ReceiptStatus>> {
        let receipt = self
            .read("receipt", |p| async move {
                p.get_transaction_receipt(tx_hash).await
            })
            .await?;

        Ok(receipt.map(|r| {
            if r.status() {
                ReceiptStatus::Succeeded {
                    block_number: r.block_number,
                }
            } else {
                ReceiptStatus::Reverted {
                    block_number: r.block_number,
                }
            }
        }))
    }

    async fn is_healthy(&self) -> bool {
        let healthy = self
            .read("block_number", |p| async move { p.get_block_number().await })
            .await
            .is_ok();
        metrics::record_ledger_health(healthy);
        healthy
    }
}

impl std::fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedger")
            .field("rpc_url", &self.rpc_url)
            .field("failovers", &self.failovers.len())
            .field("chain_id", &self.chain_id)
            .field("timeout", &self.timeout_duration)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> BlockchainConfig {
        BlockchainConfig {
            // Port 1 refuses connections on any sane host
            rpc_url: "http://127.0.0.1:1".to_string(),
            chain_id: 31337,
            rpc_timeout_secs: 2,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_connect_tolerates_unreachable_node() {
        let result = RpcLedger::connect(&unreachable_config()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_rpc_url() {
        let config = BlockchainConfig {
            rpc_url: "not a url".to_string(),
            ..Default::default()
        };
        let err = RpcLedger::connect(&config).await.unwrap_err();
        assert!(matches!(err, BlockchainError::InvalidRpcUrl { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_is_classified() {
        let mut config = unreachable_config();
        config.failover_urls.push("http://127.0.0.1:2".to_string());
        let ledger = RpcLedger::connect(&config).await.unwrap();

        let err = ledger.fee_level().await.unwrap_err();
        assert!(err.is_connectivity(), "unexpected error: {err}");

        let err = ledger.broadcast(Bytes::from_static(&[0xc0])).await.unwrap_err();
        assert!(err.is_connectivity(), "unexpected error: {err}");

        assert!(!ledger.is_healthy().await);
    }
}
