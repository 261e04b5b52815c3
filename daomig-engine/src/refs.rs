//! Substitution of symbolic parameter references with concrete values.
//!
//! References resolve to JSON values (addresses and hashes as `0x` strings),
//! which are then coerced to the callee's ABI types.

use std::collections::BTreeMap;

use serde_json::Value;

use daomig_core::constants::DEFAULT_VOTING_PARAMS_INDEX;
use daomig_core::{Address, Bytes32, ConfigError, ContractName, ModuleSpec, ParamRef, WellKnown};

/// Addresses and hashes known at the point of resolution.
///
/// Lists only contain entries that already exist; referencing anything beyond
/// them is a configuration error.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub voting_machine: Option<Address>,
    pub avatar: Option<Address>,
    pub controller: Option<Address>,
    pub native_token: Option<Address>,
    pub native_reputation: Option<Address>,
    pub voting_params: &'a [Bytes32],
    pub stand_alone: &'a [Address],
    pub package: &'a BTreeMap<ContractName, Address>,
    /// Installed module addresses, by module index.
    pub modules: &'a [Option<Address>],
}

fn address_value(a: Address) -> Value {
    Value::String(a.to_string())
}

fn not_available(field: &str, what: impl std::fmt::Display) -> ConfigError {
    ConfigError::invalid(field, format!("{what} is not available at this point of the migration"))
}

impl<'a> ResolveContext<'a> {
    pub fn well_known(&self, w: WellKnown) -> Option<Address> {
        match w {
            WellKnown::VotingMachine => self.voting_machine,
            WellKnown::Avatar => self.avatar,
            WellKnown::Controller => self.controller,
            WellKnown::NativeToken => self.native_token,
            WellKnown::NativeReputation => self.native_reputation,
            WellKnown::ZeroAddress => Some(Address::ZERO),
        }
    }

    /// Resolve one reference. `module` supplies the default voting params index.
    pub fn resolve_one(
        &self,
        field: &str,
        reference: &ParamRef,
        module: Option<&ModuleSpec>,
    ) -> Result<Value, ConfigError> {
        match reference {
            ParamRef::Literal(v) => Ok(v.clone()),
            ParamRef::WellKnown(w) => self
                .well_known(*w)
                .map(address_value)
                .ok_or_else(|| not_available(field, format!("{w:?}"))),
            ParamRef::VotingParams(explicit) => {
                let idx = match module {
                    Some(m) => m.voting_params_index(*explicit),
                    None => explicit.unwrap_or(DEFAULT_VOTING_PARAMS_INDEX),
                };
                self.voting_params
                    .get(idx)
                    .map(|h| Value::String(h.to_string()))
                    .ok_or_else(|| {
                        ConfigError::invalid(
                            field,
                            format!("voting params index {idx} is out of range ({} set)", self.voting_params.len()),
                        )
                    })
            }
            ParamRef::StandAlone(j) => self
                .stand_alone
                .get(*j)
                .copied()
                .map(address_value)
                .ok_or_else(|| not_available(field, format!("stand-alone contract {j}"))),
            ParamRef::PackageContract(name) => self
                .package
                .get(name)
                .copied()
                .map(address_value)
                .ok_or_else(|| ConfigError::invalid(field, format!("package contract {name} is not part of the base package"))),
            ParamRef::Module(k) => self
                .modules
                .get(*k)
                .copied()
                .flatten()
                .map(address_value)
                .ok_or_else(|| not_available(field, format!("module {k}"))),
        }
    }

    /// Resolve a parameter list in order, naming the first failing entry.
    pub fn resolve(
        &self,
        field: &str,
        refs: &[ParamRef],
        module: Option<&ModuleSpec>,
    ) -> Result<Vec<Value>, ConfigError> {
        refs.iter()
            .enumerate()
            .map(|(i, r)| self.resolve_one(&format!("{field}[{i}]"), r, module))
            .collect()
    }
}
