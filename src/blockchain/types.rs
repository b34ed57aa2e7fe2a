//! Ledger-facing types and error definitions.

use std::time::Duration;

use alloy::primitives::TxHash;
use alloy::transports::{RpcError, TransportError};
use thiserror::Error;

use crate::resilience::Retryable;

/// Wei per gwei.
pub const GWEI: u128 = 1_000_000_000;

/// Errors raised while setting up the custodial account or contract.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// Invalid private key format or missing key.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Transaction could not be signed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Contract address, ABI or method is unusable.
    #[error("Contract error: {0}")]
    Contract(String),

    /// RPC URL could not be parsed.
    #[error("Invalid RPC URL '{url}': {reason}")]
    InvalidRpcUrl { url: String, reason: String },

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },
}

/// Result type for setup operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// Failure of a single ledger call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// No provider could be reached.
    #[error("ledger unreachable: {0}")]
    Unreachable(String),

    /// The ledger answered and refused the request.
    #[error("ledger rejected request: {0}")]
    Rejected(String),

    /// The call did not complete within its deadline.
    #[error("ledger call timed out after {0:?}")]
    Timeout(Duration),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    /// True when the ledger never answered.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, LedgerError::Unreachable(_) | LedgerError::Timeout(_))
    }
}

impl Retryable for LedgerError {
    fn is_retryable(&self) -> bool {
        self.is_connectivity()
    }
}

impl From<TransportError> for LedgerError {
    fn from(e: TransportError) -> Self {
        match e {
            RpcError::ErrorResp(payload) => LedgerError::Rejected(payload.message.to_string()),
            RpcError::Transport(kind) => LedgerError::Unreachable(kind.to_string()),
            other => LedgerError::Rejected(other.to_string()),
        }
    }
}

/// Final status of an included transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Succeeded { block_number: Option<u64> },
    Reverted { block_number: Option<u64> },
}

/// Why a relay call failed.
///
/// Only `EstimationFailed` and `NetworkUnavailable` without a hash are known
/// not to have moved funds.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayError {
    /// Failed before any signed bytes reached the network.
    #[error("estimation failed: {0}")]
    EstimationFailed(String),

    /// The network rejected the transaction, or it failed after broadcast.
    #[error("submission failed: {reason}")]
    SubmissionFailed {
        reason: String,
        tx_hash: Option<TxHash>,
    },

    /// The network could not be reached.
    #[error("network unavailable: {reason}")]
    NetworkUnavailable {
        reason: String,
        tx_hash: Option<TxHash>,
    },
}

impl RelayError {
    /// Stable label used in responses and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::EstimationFailed(_) => "estimation_failed",
            RelayError::SubmissionFailed { .. } => "submission_failed",
            RelayError::NetworkUnavailable { .. } => "network_unavailable",
        }
    }

    /// Whether the caller may resubmit without inspecting the ledger first.
    pub fn retryable(&self) -> bool {
        !matches!(self, RelayError::SubmissionFailed { .. })
    }

    /// Hash of the transaction, when one was signed before the failure.
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            RelayError::EstimationFailed(_) => None,
            RelayError::SubmissionFailed { tx_hash, .. }
            | RelayError::NetworkUnavailable { tx_hash, .. } => *tx_hash,
        }
    }
}
