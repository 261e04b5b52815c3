//! # daomig-engine
//!
//! The resumable deployment workflow.
//!
//! - [`abi`]: JSON coercion and codec helpers over `ethers::abi`
//! - [`artifacts`]: compiled contract artifacts of one package version
//! - [`gateway`]: the [`LedgerGateway`] seam to a chain
//! - [`resolver`]: reuse of prior deployments
//! - [`refs`]: substitution of symbolic parameter references
//! - [`founders`]: founder batch slicing
//! - [`base`]: the base package plan
//! - [`preflight`]: document checks against the package and artifacts
//! - [`orchestrator`]: [`MigrationContext`], which runs the stages

pub mod abi;
pub mod artifacts;
pub mod base;
pub mod error;
pub mod founders;
pub mod gateway;
pub mod orchestrator;
pub mod preflight;
pub mod refs;
pub mod resolver;
mod stages;

pub use artifacts::{Artifact, ArtifactRegistry};
pub use error::{AbiError, ArtifactError, GatewayError, MigrateError};
pub use gateway::{Deployment, LedgerGateway, Log, Receipt};
pub use orchestrator::{MigrationContext, MigrationInputs, MigrationOptions};
pub use resolver::{ReusePolicy, ReuseResolver};
