//! The input parameter document describing one organization to migrate.
//!
//! Loaded from JSON or YAML (by file extension). Symbolic references inside
//! module and stand-alone parameter lists are modelled as [`ParamRef`] and
//! checked up front by [`MigrationParams::validate`], so that a bad index is
//! reported before any transaction is submitted.

use std::path::Path;

use ethers::types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::constants::{DEFAULT_VOTING_PARAMS_INDEX, MAX_MODULE_NAME_BYTES};
use crate::error::ConfigError;
use crate::types::{Address, Amount, Bytes32, ContractName, PermissionMask};

// ---------------------------------------------------------------------------
// Symbolic references
// ---------------------------------------------------------------------------

/// Named placeholders substituted with addresses known only during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WellKnown {
    /// The package's voting machine (`GenesisProtocol`).
    VotingMachine,
    Avatar,
    Controller,
    NativeToken,
    NativeReputation,
    ZeroAddress,
}

/// One argument of a constructor, initializer or hook call.
///
/// Resolution precedence follows declaration order: literal, well-known
/// placeholder, voting params index, stand-alone index, package contract,
/// module index.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamRef {
    Literal(Value),
    WellKnown(WellKnown),
    /// `None` means "the owning module's `vote_params`, else index 0".
    VotingParams(Option<usize>),
    StandAlone(usize),
    PackageContract(ContractName),
    /// Address of an installed module; only valid in post-install hooks.
    Module(usize),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TaggedRef {
    Literal(Value),
    WellKnown(WellKnown),
    VotingParams(Option<usize>),
    StandAlone(usize),
    PackageContract(ContractName),
    Module(usize),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ParamRefRepr {
    Tagged(TaggedRef),
    Bare(Value),
}

impl From<TaggedRef> for ParamRef {
    fn from(t: TaggedRef) -> Self {
        match t {
            TaggedRef::Literal(v) => ParamRef::Literal(v),
            TaggedRef::WellKnown(w) => ParamRef::WellKnown(w),
            TaggedRef::VotingParams(i) => ParamRef::VotingParams(i),
            TaggedRef::StandAlone(i) => ParamRef::StandAlone(i),
            TaggedRef::PackageContract(n) => ParamRef::PackageContract(n),
            TaggedRef::Module(i) => ParamRef::Module(i),
        }
    }
}

impl Serialize for ParamRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let tagged = match self.clone() {
            ParamRef::Literal(v) => TaggedRef::Literal(v),
            ParamRef::WellKnown(w) => TaggedRef::WellKnown(w),
            ParamRef::VotingParams(i) => TaggedRef::VotingParams(i),
            ParamRef::StandAlone(i) => TaggedRef::StandAlone(i),
            ParamRef::PackageContract(n) => TaggedRef::PackageContract(n),
            ParamRef::Module(i) => TaggedRef::Module(i),
        };
        tagged.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ParamRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match ParamRefRepr::deserialize(deserializer)? {
            ParamRefRepr::Tagged(t) => t.into(),
            ParamRefRepr::Bare(v) => ParamRef::Literal(v),
        })
    }
}

/// Target of a hook call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractRef {
    StandAlone(usize),
    Module(usize),
    PackageContract(ContractName),
    WellKnown(WellKnown),
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A founding member with initial token and reputation allocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Founder {
    pub address: Address,
    #[serde(default)]
    pub tokens: Amount,
    #[serde(default)]
    pub reputation: Amount,
}

/// GenesisProtocol voting parameters, in on-chain array order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisProtocolParams {
    pub queued_vote_required_percentage: u64,
    pub queued_vote_period_limit: u64,
    pub boosted_vote_period_limit: u64,
    pub pre_boosted_vote_period_limit: u64,
    pub threshold_const: u64,
    pub quiet_ending_period: u64,
    pub proposing_rep_reward: Amount,
    pub voters_reputation_loss_ratio: u64,
    pub minimum_dao_bounty: Amount,
    pub dao_bounty_const: u64,
    pub activation_time: u64,
    #[serde(default)]
    pub vote_on_behalf: Address,
}

impl GenesisProtocolParams {
    /// The `uint256[11]` argument of `setParameters`, amounts in wei.
    pub fn to_uint_array(&self) -> Result<[U256; 11], ConfigError> {
        let wei = |field: &str, a: &Amount| {
            a.to_wei()
                .map_err(|e| ConfigError::invalid(field, e.to_string()))
        };
        Ok([
            U256::from(self.queued_vote_required_percentage),
            U256::from(self.queued_vote_period_limit),
            U256::from(self.boosted_vote_period_limit),
            U256::from(self.pre_boosted_vote_period_limit),
            U256::from(self.threshold_const),
            U256::from(self.quiet_ending_period),
            wei("proposing_rep_reward", &self.proposing_rep_reward)?,
            U256::from(self.voters_reputation_loss_ratio),
            wei("minimum_dao_bounty", &self.minimum_dao_bounty)?,
            U256::from(self.dao_bounty_const),
            U256::from(self.activation_time),
        ])
    }
}

/// One voting-machine parameter set: either a known hash or values to register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VotingParamsSpec {
    Precomputed { voting_params_hash: Bytes32 },
    Parameters(GenesisProtocolParams),
}

/// A module (scheme) to install on the new organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub name: ContractName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub permissions: PermissionMask,
    /// Voting params index used by `{"voting_params": null}` references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_params: Option<usize>,
    /// Shared scheme configured per organization through `setParameters`;
    /// the hash it returns is registered with the scheme.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub universal: bool,
    /// An already deployed instance to configure and register instead of
    /// deploying a new one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Method called with `params`; `initialize`, or `setParameters` for
    /// universal modules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<String>,
    #[serde(default)]
    pub params: Vec<ParamRef>,
}

impl ModuleSpec {
    pub fn voting_params_index(&self, explicit: Option<usize>) -> usize {
        explicit
            .or(self.vote_params)
            .unwrap_or(DEFAULT_VOTING_PARAMS_INDEX)
    }

    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(self.name.as_str())
    }

    pub fn initializer(&self) -> &str {
        match &self.initializer {
            Some(method) => method,
            None if self.universal => "setParameters",
            None => "initialize",
        }
    }
}

/// A method call with symbolic arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSpec {
    pub method: String,
    #[serde(default)]
    pub params: Vec<ParamRef>,
}

/// An auxiliary contract deployed outside the module batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandAloneSpec {
    pub name: ContractName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub constructor_params: Vec<ParamRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialize: Option<CallSpec>,
    #[serde(default)]
    pub hooks: Vec<CallSpec>,
}

/// A call run once after modules are installed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostInstallHook {
    pub target: ContractRef,
    pub method: String,
    #[serde(default)]
    pub params: Vec<ParamRef>,
}

/// How the organization instance is created and its modules registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    /// Package factory: `forgeOrg` + `addFounders` + one batched `setSchemes`.
    #[default]
    Factory,
    /// Contracts deployed one by one; modules registered on the controller.
    Controller,
}

/// Root of the parameter document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationParams {
    pub org_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_symbol: Option<String>,
    #[serde(default)]
    pub token_cap: Amount,
    #[serde(default)]
    pub metadata: String,
    #[serde(default)]
    pub founders: Vec<Founder>,
    #[serde(default)]
    pub voting_machines_params: Vec<VotingParamsSpec>,
    #[serde(default)]
    pub modules: Vec<ModuleSpec>,
    #[serde(default)]
    pub stand_alone: Vec<StandAloneSpec>,
    #[serde(default)]
    pub post_install_hooks: Vec<PostInstallHook>,
    #[serde(default)]
    pub mode: DeploymentMode,
    #[serde(default)]
    pub use_universal_controller: bool,
    #[serde(default)]
    pub register_in_dao_registry: bool,
}

/// Where a parameter list appears; decides which references are legal.
#[derive(Debug, Clone, Copy)]
enum RefScope<'a> {
    Module(&'a ModuleSpec),
    /// Constructor of stand-alone entry `i`: only entries `< i` exist.
    StandAloneConstructor(usize),
    /// Initializer or hook of stand-alone entry `i`: entries `<= i` exist.
    StandAloneCall(usize),
    PostInstall,
}

impl MigrationParams {
    /// Load from `path`; `.yaml`/`.yml` is read as YAML, anything else as JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::ParseYaml {
                path: path.to_path_buf(),
                source,
            })
        } else {
            serde_json::from_str(&contents).map_err(|source| ConfigError::ParseJson {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    pub fn token_name(&self) -> String {
        self.token_name
            .clone()
            .unwrap_or_else(|| format!("{} Token", self.org_name))
    }

    /// Explicit symbol, else the organization's initials followed by `T`.
    pub fn token_symbol(&self) -> String {
        self.token_symbol.clone().unwrap_or_else(|| {
            let mut symbol: String = self
                .org_name
                .split_whitespace()
                .filter_map(|w| w.chars().next())
                .flat_map(char::to_uppercase)
                .collect();
            symbol.push('T');
            symbol
        })
    }

    /// Hex SHA-256 of the canonical JSON encoding.
    pub fn digest(&self) -> Result<String, ConfigError> {
        let bytes = serde_json::to_vec(self)
            .map_err(|e| ConfigError::invalid("<document>", e.to_string()))?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    /// Check every symbolic reference and amount before any on-chain action.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.org_name.trim().is_empty() {
            return Err(ConfigError::invalid("org_name", "must not be empty"));
        }
        self.token_cap
            .to_wei()
            .map_err(|e| ConfigError::invalid("token_cap", e.to_string()))?;
        for (i, f) in self.founders.iter().enumerate() {
            f.tokens
                .to_wei()
                .map_err(|e| ConfigError::invalid(format!("founders[{i}].tokens"), e.to_string()))?;
            f.reputation.to_wei().map_err(|e| {
                ConfigError::invalid(format!("founders[{i}].reputation"), e.to_string())
            })?;
        }
        for (i, vp) in self.voting_machines_params.iter().enumerate() {
            if let VotingParamsSpec::Parameters(p) = vp {
                p.to_uint_array().map_err(|e| match e {
                    ConfigError::Invalid { field, message } => ConfigError::invalid(
                        format!("voting_machines_params[{i}].{field}"),
                        message,
                    ),
                    other => other,
                })?;
            }
        }

        for (i, module) in self.modules.iter().enumerate() {
            if self.mode == DeploymentMode::Factory {
                if module.name.as_str().len() > MAX_MODULE_NAME_BYTES {
                    return Err(ConfigError::invalid(
                        format!("modules[{i}].name"),
                        format!("longer than {MAX_MODULE_NAME_BYTES} bytes; the factory identifies modules by a bytes32 name"),
                    ));
                }
                if module.universal || module.address.is_some() {
                    return Err(ConfigError::invalid(
                        format!("modules[{i}]"),
                        "universal and pre-deployed modules are only supported with mode: controller",
                    ));
                }
            }
            if let Some(idx) = module.vote_params {
                self.check_voting_index(&format!("modules[{i}].vote_params"), idx)?;
            }
            self.check_refs(&format!("modules[{i}].params"), &module.params, RefScope::Module(module))?;
        }

        for (i, sa) in self.stand_alone.iter().enumerate() {
            self.check_refs(
                &format!("stand_alone[{i}].constructor_params"),
                &sa.constructor_params,
                RefScope::StandAloneConstructor(i),
            )?;
            if let Some(init) = &sa.initialize {
                self.check_refs(
                    &format!("stand_alone[{i}].initialize.params"),
                    &init.params,
                    RefScope::StandAloneCall(i),
                )?;
            }
            for (h, hook) in sa.hooks.iter().enumerate() {
                self.check_refs(
                    &format!("stand_alone[{i}].hooks[{h}].params"),
                    &hook.params,
                    RefScope::StandAloneCall(i),
                )?;
            }
        }

        for (h, hook) in self.post_install_hooks.iter().enumerate() {
            let field = format!("post_install_hooks[{h}].target");
            match &hook.target {
                ContractRef::StandAlone(j) if *j >= self.stand_alone.len() => {
                    return Err(out_of_range(&field, "stand_alone", *j, self.stand_alone.len()));
                }
                ContractRef::Module(k) if *k >= self.modules.len() => {
                    return Err(out_of_range(&field, "modules", *k, self.modules.len()));
                }
                ContractRef::WellKnown(WellKnown::ZeroAddress) => {
                    return Err(ConfigError::invalid(field, "cannot call the zero address"));
                }
                _ => {}
            }
            self.check_refs(
                &format!("post_install_hooks[{h}].params"),
                &hook.params,
                RefScope::PostInstall,
            )?;
        }
        Ok(())
    }

    fn check_voting_index(&self, field: &str, idx: usize) -> Result<(), ConfigError> {
        let len = self.voting_machines_params.len();
        if idx >= len {
            return Err(out_of_range(field, "voting_machines_params", idx, len));
        }
        Ok(())
    }

    fn check_refs(&self, field: &str, refs: &[ParamRef], scope: RefScope<'_>) -> Result<(), ConfigError> {
        for (p, r) in refs.iter().enumerate() {
            let field = format!("{field}[{p}]");
            match r {
                ParamRef::Literal(Value::Object(map)) => {
                    let keys: Vec<_> = map.keys().cloned().collect();
                    return Err(ConfigError::invalid(
                        field,
                        format!("unknown reference {keys:?}; wrap object literals in {{\"literal\": ..}}"),
                    ));
                }
                ParamRef::Literal(_) | ParamRef::WellKnown(_) | ParamRef::PackageContract(_) => {}
                ParamRef::VotingParams(explicit) => {
                    let idx = match scope {
                        RefScope::Module(m) => m.voting_params_index(*explicit),
                        _ => explicit.unwrap_or(DEFAULT_VOTING_PARAMS_INDEX),
                    };
                    self.check_voting_index(&field, idx)?;
                }
                ParamRef::StandAlone(j) => {
                    let available = match scope {
                        RefScope::StandAloneConstructor(i) => i,
                        RefScope::StandAloneCall(i) => i + 1,
                        RefScope::Module(_) | RefScope::PostInstall => self.stand_alone.len(),
                    };
                    if *j >= available {
                        return Err(out_of_range(&field, "stand_alone", *j, available));
                    }
                }
                ParamRef::Module(k) => {
                    if !matches!(scope, RefScope::PostInstall) {
                        return Err(ConfigError::invalid(
                            field,
                            "module addresses are only known after installation; use them in post_install_hooks",
                        ));
                    }
                    if *k >= self.modules.len() {
                        return Err(out_of_range(&field, "modules", *k, self.modules.len()));
                    }
                }
            }
        }
        Ok(())
    }
}

fn out_of_range(field: &str, list: &str, idx: usize, len: usize) -> ConfigError {
    ConfigError::invalid(
        field,
        format!("index {idx} is out of range: {list} has {len} usable entr{}", if len == 1 { "y" } else { "ies" }),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_doc() -> Value {
        json!({
            "org_name": "My DAO",
            "founders": [
                { "address": "0x1111111111111111111111111111111111111111", "tokens": 10, "reputation": 10 }
            ],
            "voting_machines_params": [
                { "voting_params_hash": "0x0101010101010101010101010101010101010101010101010101010101010101" }
            ],
            "modules": [
                {
                    "name": "ContributionReward",
                    "permissions": "0x00000000",
                    "params": [{ "well_known": "avatar" }, { "well_known": "voting_machine" }, { "voting_params": null }]
                }
            ]
        })
    }

    fn parse(v: Value) -> MigrationParams {
        serde_json::from_value(v).expect("parse params")
    }

    #[test]
    fn param_refs_parse_tagged_and_bare() {
        let refs: Vec<ParamRef> = serde_json::from_value(json!([
            "0x2222222222222222222222222222222222222222",
            42,
            { "literal": { "k": 1 } },
            { "voting_params": 1 },
            { "voting_params": null },
            { "stand_alone": 0 },
            { "package_contract": "DAOFactoryInstance" },
            { "well_known": "native_token" },
            { "module": 2 }
        ]))
        .unwrap();
        assert_eq!(
            refs,
            vec![
                ParamRef::Literal(json!("0x2222222222222222222222222222222222222222")),
                ParamRef::Literal(json!(42)),
                ParamRef::Literal(json!({ "k": 1 })),
                ParamRef::VotingParams(Some(1)),
                ParamRef::VotingParams(None),
                ParamRef::StandAlone(0),
                ParamRef::PackageContract(ContractName::from("DAOFactoryInstance")),
                ParamRef::WellKnown(WellKnown::NativeToken),
                ParamRef::Module(2),
            ]
        );
    }

    #[test]
    fn param_ref_serializes_canonically() {
        let json = serde_json::to_value(ParamRef::Literal(json!(7))).unwrap();
        assert_eq!(json, json!({ "literal": 7 }));
        let json = serde_json::to_value(ParamRef::VotingParams(None)).unwrap();
        assert_eq!(json, json!({ "voting_params": null }));
    }

    #[test]
    fn voting_params_spec_distinguishes_hash_from_values() {
        let params = parse(base_doc());
        assert!(matches!(
            params.voting_machines_params[0],
            VotingParamsSpec::Precomputed { .. }
        ));
    }

    #[test]
    fn module_without_index_defaults_to_zero() {
        let params = parse(base_doc());
        assert_eq!(params.modules[0].voting_params_index(None), DEFAULT_VOTING_PARAMS_INDEX);
        assert_eq!(params.modules[0].voting_params_index(Some(3)), 3);
        params.validate().expect("valid document");
    }

    #[test]
    fn module_vote_params_field_overrides_default() {
        let mut doc = base_doc();
        doc["modules"][0]["vote_params"] = json!(2);
        let params = parse(doc);
        assert_eq!(params.modules[0].voting_params_index(None), 2);
        let err = params.validate().unwrap_err();
        assert!(err.to_string().contains("modules[0].vote_params"), "got: {err}");
    }

    #[test]
    fn out_of_range_voting_index_names_the_field() {
        let mut doc = base_doc();
        doc["modules"][0]["params"][2] = json!({ "voting_params": 5 });
        let err = parse(doc).validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("modules[0].params[2]"), "got: {err}");
    }

    #[test]
    fn stand_alone_constructor_cannot_reference_itself() {
        let mut doc = base_doc();
        doc["stand_alone"] = json!([
            { "name": "RepAllocation", "constructor_params": [{ "stand_alone": 0 }] }
        ]);
        let err = parse(doc).validate().unwrap_err();
        assert!(err.to_string().contains("stand_alone[0].constructor_params[0]"), "got: {err}");
    }

    #[test]
    fn stand_alone_initializer_may_reference_itself() {
        let mut doc = base_doc();
        doc["stand_alone"] = json!([
            { "name": "RepAllocation", "initialize": { "method": "initialize", "params": [{ "stand_alone": 0 }] } }
        ]);
        parse(doc).validate().expect("self reference after deploy is fine");
    }

    #[test]
    fn module_reference_outside_post_install_is_rejected() {
        let mut doc = base_doc();
        doc["modules"][0]["params"][0] = json!({ "module": 0 });
        let err = parse(doc).validate().unwrap_err();
        assert!(err.to_string().contains("post_install_hooks"), "got: {err}");
    }

    #[test]
    fn unknown_reference_tag_is_rejected() {
        let mut doc = base_doc();
        doc["modules"][0]["params"][0] = json!({ "voting_param": 0 });
        let err = parse(doc).validate().unwrap_err();
        assert!(err.to_string().contains("unknown reference"), "got: {err}");
    }

    #[test]
    fn zero_address_hook_target_is_rejected() {
        let mut doc = base_doc();
        doc["post_install_hooks"] = json!([
            { "target": { "well_known": "zero_address" }, "method": "transferOwnership", "params": [] }
        ]);
        let err = parse(doc).validate().unwrap_err();
        assert!(err.to_string().contains("post_install_hooks[0].target"), "got: {err}");
        assert!(err.to_string().contains("zero address"), "got: {err}");
    }

    #[test]
    fn factory_module_names_must_fit_a_word() {
        let mut doc = base_doc();
        doc["modules"][0]["name"] = json!("A".repeat(33));
        let err = parse(doc.clone()).validate().unwrap_err();
        assert!(err.to_string().contains("modules[0].name"), "got: {err}");

        doc["mode"] = json!("controller");
        parse(doc).validate().expect("controller mode registers by address");
    }

    #[test]
    fn universal_and_predeployed_modules_need_controller_mode() {
        let mut doc = base_doc();
        doc["modules"][0]["universal"] = json!(true);
        let err = parse(doc.clone()).validate().unwrap_err();
        assert!(err.to_string().contains("mode: controller"), "got: {err}");

        doc["mode"] = json!("controller");
        doc["modules"][0]["address"] = json!("0x3333333333333333333333333333333333333333");
        let params = parse(doc);
        params.validate().expect("valid in controller mode");
        assert_eq!(params.modules[0].initializer(), "setParameters");
    }

    #[test]
    fn initializer_defaults_and_override() {
        let mut doc = base_doc();
        let params = parse(doc.clone());
        assert_eq!(params.modules[0].initializer(), "initialize");
        doc["modules"][0]["initializer"] = json!("init");
        assert_eq!(parse(doc).modules[0].initializer(), "init");
    }

    #[test]
    fn token_defaults_derive_from_org_name() {
        let params = parse(base_doc());
        assert_eq!(params.token_name(), "My DAO Token");
        assert_eq!(params.token_symbol(), "MDT");
    }

    #[test]
    fn digest_changes_with_content() {
        let a = parse(base_doc());
        let mut b = a.clone();
        b.org_name = "Other DAO".into();
        assert_eq!(a.digest().unwrap(), a.clone().digest().unwrap());
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
    }

    #[test]
    fn genesis_params_convert_amounts_to_wei() {
        let p: GenesisProtocolParams = serde_json::from_value(json!({
            "queued_vote_required_percentage": 50,
            "queued_vote_period_limit": 1800,
            "boosted_vote_period_limit": 600,
            "pre_boosted_vote_period_limit": 600,
            "threshold_const": 2000,
            "quiet_ending_period": 300,
            "proposing_rep_reward": 5,
            "voters_reputation_loss_ratio": 1,
            "minimum_dao_bounty": 100,
            "dao_bounty_const": 10,
            "activation_time": 0
        }))
        .unwrap();
        let arr = p.to_uint_array().unwrap();
        assert_eq!(arr[0], U256::from(50));
        assert_eq!(arr[6], U256::from(5) * U256::exp10(18));
        assert_eq!(arr[8], U256::from(100) * U256::exp10(18));
        assert!(p.vote_on_behalf.is_zero());
    }
}
