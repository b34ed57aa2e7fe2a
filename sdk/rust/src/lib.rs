//! Client for the faucet relay HTTP API.

pub mod client;

pub use client::{
    AdmissionReply, ErrorReply, FaucetClient, HealthReply, Reply, SdkError, WithdrawReply,
};
