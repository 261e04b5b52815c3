//! The Ledger Gateway seam: everything the orchestrator needs from a chain.
//!
//! Implementors provide four raw operations; contract-level helpers
//! (`deploy_contract`, `call_contract`, `send_transaction`) are built on top
//! and may be overridden by test doubles.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use daomig_core::{Address, Bytes, Bytes32};

use crate::abi::{self, Event, Token};
use crate::artifacts::Artifact;
use crate::error::{AbiError, GatewayError};

/// One emitted log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<Bytes32>,
    pub data: Bytes,
}

/// A mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: Bytes32,
    pub block_number: u64,
    pub gas_used: u64,
    /// `false` when the transaction reverted.
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub logs: Vec<Log>,
}

impl Receipt {
    /// Decode every log emitted by `event`, in log order.
    pub fn events(&self, event: &Event) -> Result<Vec<BTreeMap<String, Token>>, AbiError> {
        self.logs
            .iter()
            .filter(|log| abi::log_matches(event, &log.topics))
            .map(|log| abi::decode_log(event, &log.topics, &log.data))
            .collect()
    }
}

/// A confirmed contract creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub address: Address,
    pub receipt: Receipt,
}

/// Blocking access to a chain. Every method is a single attempt; failures are
/// reported, never retried.
pub trait LedgerGateway {
    /// Broadcast a transaction from the deployer and wait for its receipt.
    /// `to = None` creates a contract.
    fn send_raw(&mut self, to: Option<Address>, data: &[u8]) -> Result<Receipt, GatewayError>;

    /// Read-only call against the latest block.
    fn call_raw(&mut self, to: Address, data: &[u8]) -> Result<Bytes, GatewayError>;

    /// Runtime bytecode at `address`; empty when no contract lives there.
    fn get_code(&mut self, address: Address) -> Result<Bytes, GatewayError>;

    /// Number of transactions ever sent by `account`.
    fn get_transaction_count(&mut self, account: Address) -> Result<u64, GatewayError>;

    fn deploy_contract(&mut self, artifact: &Artifact, args: &[Token]) -> Result<Deployment, GatewayError> {
        let data = artifact.deploy_data(args)?;
        let receipt = self.send_raw(None, &data)?;
        let address = receipt
            .contract_address
            .ok_or(GatewayError::MissingContractAddress { tx_hash: receipt.tx_hash })?;
        Ok(Deployment { address, receipt })
    }

    fn call_contract(
        &mut self,
        address: Address,
        artifact: &Artifact,
        method: &str,
        args: &[Token],
    ) -> Result<Vec<Token>, GatewayError> {
        let function = artifact.function(method, args.len())?;
        let output = self.call_raw(address, &abi::encode_call(function, args)?)?;
        Ok(abi::decode_output(function, &output)?)
    }

    fn send_transaction(
        &mut self,
        address: Address,
        artifact: &Artifact,
        method: &str,
        args: &[Token],
    ) -> Result<Receipt, GatewayError> {
        let function = artifact.function(method, args.len())?;
        self.send_raw(Some(address), &abi::encode_call(function, args)?)
    }
}
