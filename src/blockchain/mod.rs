//! Ledger integration and the transaction relay.
//!
//! # Data Flow
//! ```text
//! Environment (private key) + config (RPC URL, contract, ABI)
//!     → wallet.rs (key loading, signing, nonces)
//!     → contract.rs (withdrawTo calldata)
//!     → client.rs (RPC connection with timeouts and failover)
//!     → transaction.rs (fee, estimate, sign, broadcast, receipt)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or raw transactions
//! - All RPC calls have configurable timeouts
//! - Graceful degradation when the ledger is unreachable

pub mod client;
pub mod contract;
pub mod ledger;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::RpcLedger;
pub use contract::ContractInterface;
pub use ledger::Ledger;
pub use transaction::TransactionRelay;
pub use types::{
    BlockchainError, LedgerError, LedgerResult, ReceiptStatus, RelayError,
};
pub use wallet::Wallet;
