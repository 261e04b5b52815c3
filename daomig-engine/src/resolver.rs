//! Reuse Resolver: decides whether a recorded deployment can stand in for a
//! fresh one.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use daomig_core::constants::BASE_TOKEN_NAME;
use daomig_core::{Address, Bytes, ContractName, NetworkKey, PackageVersion};
use daomig_ledger::MigrationRecord;

use crate::error::GatewayError;
use crate::gateway::LedgerGateway;

/// Operator overrides for reuse decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReusePolicy {
    /// Names that must be deployed fresh even when a match exists.
    pub redeploy: BTreeSet<ContractName>,
}

impl ReusePolicy {
    pub fn forces_redeploy(&self, name: &ContractName) -> bool {
        self.redeploy.contains(name)
    }
}

/// Scans the deployment record of one network for reusable contracts.
#[derive(Debug, Clone, Copy)]
pub struct ReuseResolver<'a> {
    record: &'a MigrationRecord,
    network: &'a NetworkKey,
    version: &'a PackageVersion,
    policy: &'a ReusePolicy,
}

impl<'a> ReuseResolver<'a> {
    pub fn new(
        record: &'a MigrationRecord,
        network: &'a NetworkKey,
        version: &'a PackageVersion,
        policy: &'a ReusePolicy,
    ) -> Self {
        Self {
            record,
            network,
            version,
            policy,
        }
    }

    /// Address of a prior deployment of `name` that can be reused, if any.
    ///
    /// A candidate matches when its on-chain runtime code equals
    /// `expected_code` and its recorded dependencies equal `dependencies`
    /// (order-sensitive). The base token is the exception: any prior instance
    /// that still has code is reused unless the policy forces a redeploy.
    ///
    /// Read failures propagate; they are never treated as "no match".
    pub fn should_reuse<G: LedgerGateway>(
        &self,
        gateway: &mut G,
        name: &ContractName,
        expected_code: &Bytes,
        dependencies: &[Address],
    ) -> Result<Option<Address>, GatewayError> {
        if self.policy.forces_redeploy(name) {
            info!(contract = %name, "redeploy requested; skipping reuse check");
            return Ok(None);
        }
        let is_base_token = name.as_str() == BASE_TOKEN_NAME;

        for (version, entry) in self.record.base_candidates(self.network, self.version, name) {
            let code = gateway.get_code(entry.address)?;
            if is_base_token {
                if !code.is_empty() {
                    info!(
                        contract = %name,
                        address = %entry.address,
                        version = %version,
                        "reusing existing base token (pass --redeploy {name} to deploy a new one)"
                    );
                    return Ok(Some(entry.address));
                }
                continue;
            }
            if code != *expected_code {
                debug!(contract = %name, address = %entry.address, version = %version, "bytecode differs");
                continue;
            }
            if !entry.dependencies_match(dependencies) {
                warn!(
                    contract = %name,
                    address = %entry.address,
                    version = %version,
                    "same bytecode but different dependencies; not reusing"
                );
                continue;
            }
            info!(contract = %name, address = %entry.address, version = %version, "reusing");
            return Ok(Some(entry.address));
        }
        Ok(None)
    }
}
