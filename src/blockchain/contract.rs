//! Faucet contract call encoding.

use std::path::Path;

use alloy::dyn_abi::{DynSolValue, JsonAbiExt};
use alloy::json_abi::{Function, JsonAbi};
use alloy::primitives::{Address, Bytes};

use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::config::BlockchainConfig;

/// The contract address plus the one-address method the relay calls.
#[derive(Debug, Clone)]
pub struct ContractInterface {
    address: Address,
    function: Function,
}

fn takes_single_address(function: &Function) -> bool {
    function.inputs.len() == 1 && function.inputs[0].ty == "address"
}

impl ContractInterface {
    pub fn new(address: Address, function: Function) -> BlockchainResult<Self> {
        if !takes_single_address(&function) {
            return Err(BlockchainError::Contract(format!(
                "method '{}' must take exactly one address argument, found {}",
                function.name,
                function.signature()
            )));
        }
        Ok(Self { address, function })
    }

    /// Resolve the address, ABI file (if any) and method from configuration.
    pub fn from_config(config: &BlockchainConfig) -> BlockchainResult<Self> {
        let address: Address = config.contract_address.parse().map_err(|e| {
            BlockchainError::Contract(format!(
                "invalid contract address '{}': {}",
                config.contract_address, e
            ))
        })?;

        let function = match &config.abi_path {
            Some(path) => load_function(Path::new(path), &config.method)?,
            None => Function::parse(&format!("function {}(address to)", config.method))
                .map_err(|e| BlockchainError::Contract(e.to_string()))?,
        };

        let contract = Self::new(address, function)?;
        tracing::info!(
            contract = %contract.address,
            method = %contract.function.signature(),
            "Contract interface loaded"
        );
        Ok(contract)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Selector plus ABI-encoded destination.
    pub fn encode_call(&self, destination: Address) -> BlockchainResult<Bytes> {
        self.function
            .abi_encode_input(&[DynSolValue::Address(destination)])
            .map(Bytes::from)
            .map_err(|e| BlockchainError::Contract(e.to_string()))
    }
}

/// Pick `method` out of a JSON ABI file, preferring the one-address overload.
fn load_function(path: &Path, method: &str) -> BlockchainResult<Function> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        BlockchainError::Contract(format!("cannot read ABI {}: {}", path.display(), e))
    })?;
    let abi: JsonAbi = serde_json::from_str(&raw).map_err(|e| {
        BlockchainError::Contract(format!("cannot parse ABI {}: {}", path.display(), e))
    })?;

    let overloads = abi.function(method).ok_or_else(|| {
        BlockchainError::Contract(format!("ABI {} has no method '{}'", path.display(), method))
    })?;

    overloads
        .iter()
        .find(|f| takes_single_address(f))
        .or_else(|| overloads.first())
        .cloned()
        .ok_or_else(|| BlockchainError::Contract(format!("ABI has no method '{}'", method)))
}
