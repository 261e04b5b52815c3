//! Error types for daomig-engine.

use std::path::PathBuf;

use thiserror::Error;

use daomig_core::{Bytes32, ConfigError, ContractName, PackageVersion};
use daomig_ledger::LedgerError;

/// Failures loading or querying compiled contract artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No package directory for the requested version.
    #[error("package version {version} not found under {root}")]
    VersionNotFound { root: PathBuf, version: PackageVersion },

    #[error("no artifact named {name} in package {version}")]
    NotFound { name: ContractName, version: PackageVersion },

    /// A custom artifact shadows one already loaded.
    #[error("artifact {name} from {path} collides with an existing artifact")]
    Duplicate { name: ContractName, path: PathBuf },

    #[error("{contract} has no function {method} taking {arity} argument(s)")]
    NoSuchFunction {
        contract: ContractName,
        method: String,
        arity: usize,
    },

    #[error("{contract} has no event {event}")]
    NoSuchEvent { contract: ContractName, event: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ArtifactError {
    ArtifactError::Io {
        path: path.into(),
        source,
    }
}

/// ABI encoding, decoding and literal coercion failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("unsupported ABI type '{0}'")]
    UnsupportedType(String),

    #[error("cannot use {value} as {ty}: {reason}")]
    Coerce {
        ty: String,
        value: String,
        reason: String,
    },

    #[error("{method} expects {expected} argument(s), got {found}")]
    ArgCount {
        method: String,
        expected: usize,
        found: usize,
    },

    /// Arguments do not match the declared input types.
    #[error("cannot encode arguments for {method}: {reason}")]
    Encode { method: String, reason: String },

    #[error("malformed ABI data: {0}")]
    Decode(String),
}

impl AbiError {
    pub(crate) fn coerce(ty: impl ToString, value: impl ToString, reason: impl Into<String>) -> Self {
        AbiError::Coerce {
            ty: ty.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failures reported by a Ledger Gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The node could not be reached or answered with garbage.
    #[error("transport error: {0}")]
    Transport(String),

    /// The node returned a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Mined with status 0.
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: Bytes32 },

    /// Broadcast, but no receipt arrived in time. The transaction may still be mined.
    #[error("no receipt for {tx_hash} after {secs}s")]
    Timeout { tx_hash: Bytes32, secs: u64 },

    #[error("creation transaction {tx_hash} produced no contract address")]
    MissingContractAddress { tx_hash: Bytes32 },

    #[error(transparent)]
    Abi(#[from] AbiError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

impl GatewayError {
    /// True when the failed transaction certainly consumed a nonce.
    pub fn consumed_nonce(&self) -> bool {
        matches!(self, GatewayError::Reverted { .. })
    }
}

/// Errors surfaced by a migration run.
///
/// Every variant is fatal to the run. The state store is left as it was
/// before the failing step, except that a reverted transaction still
/// advances the recorded deployer nonce so the next run does not mistake
/// it for an unrecorded broadcast.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Malformed parameters or an unresolvable reference.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A required package, contract or prior record is missing.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A gateway call failed while executing `step`.
    #[error("{step} failed: {source}")]
    Ledger {
        step: String,
        #[source]
        source: GatewayError,
    },

    /// The deployer sent transactions that the state does not account for.
    #[error(
        "deployer transaction count is {on_chain} but the saved state expects {recorded}; \
         a transaction may have been broadcast without being recorded. Inspect the chain, \
         then rerun with --accept-unrecorded-nonce"
    )]
    UnrecordedTransactions { recorded: u64, on_chain: u64 },

    /// The parameter document differs from the one the saved run started with.
    #[error(
        "parameter document changed since this run started (recorded {recorded}, now {current}); \
         rerun with --allow-param-change or reset the network state"
    )]
    ParamsChanged { recorded: String, current: String },

    /// A receipt lacked an event the step depends on.
    #[error("{step}: expected {expected} {event} event(s), found {found}")]
    MissingEvent {
        step: String,
        event: String,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    State(#[from] LedgerError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Abi(#[from] AbiError),
}

impl MigrateError {
    pub(crate) fn ledger(step: impl Into<String>, source: GatewayError) -> Self {
        MigrateError::Ledger {
            step: step.into(),
            source,
        }
    }
}
