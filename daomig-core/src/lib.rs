//! daomig core library: domain types, named constants, parameter document,
//! network configuration, errors.
//!
//! - [`types`]: address/hash newtypes over `ethers` types, amounts and permission masks
//! - [`constants`]: permission masks, batch sizes, sentinels
//! - [`params`]: the input parameter document and reference validation
//! - [`config`]: per-network YAML configuration
//! - [`error`]: [`ConfigError`], [`TypeParseError`]

pub mod config;
pub mod constants;
pub mod error;
pub mod params;
pub mod types;

pub use config::{BatchConfig, DaomigConfig, NetworkConfig};
pub use error::{ConfigError, TypeParseError};
pub use params::{
    CallSpec, ContractRef, DeploymentMode, Founder, GenesisProtocolParams, MigrationParams,
    ModuleSpec, ParamRef, PostInstallHook, StandAloneSpec, VotingParamsSpec, WellKnown,
};
pub use types::{
    Address, Amount, Bytes, Bytes32, ContractName, NetworkKey, PackageVersion, PermissionMask,
};
