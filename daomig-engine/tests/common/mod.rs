#![allow(dead_code)]

//! An in-memory chain and fixture artifacts for workflow tests.
//!
//! The chain decodes real calldata against the fixture ABIs, so everything
//! the orchestrator submits goes through the same encoder a node would see.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use serde_json::{json, Value};
use tempfile::TempDir;

use daomig_core::{Address, Bytes, Bytes32, ContractName, MigrationParams, NetworkConfig, NetworkKey, PackageVersion};
use daomig_engine::abi::{
    self, address_token, bytes32_token, decode, encode, token_address, token_bytes32, Param, ParamType, Token,
};
use ethers::types::{H160, H256, U256};
use ethers::utils::keccak256;
use daomig_engine::{
    Artifact, ArtifactRegistry, GatewayError, LedgerGateway, Log, MigrationContext, MigrationInputs,
    MigrationOptions, Receipt,
};

pub const VERSION: &str = "0.0.1-rc.19";

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

fn params_json(inputs: &[(&str, &str)]) -> Value {
    Value::Array(
        inputs
            .iter()
            .map(|(name, kind)| json!({ "name": name, "type": kind }))
            .collect(),
    )
}

fn function(name: &str, inputs: &[(&str, &str)], outputs: &[&str]) -> Value {
    json!({
        "type": "function",
        "name": name,
        "inputs": params_json(inputs),
        "outputs": outputs.iter().map(|k| json!({ "name": "", "type": k })).collect::<Vec<_>>(),
        "stateMutability": "nonpayable",
    })
}

fn constructor(inputs: &[(&str, &str)]) -> Value {
    json!({ "type": "constructor", "inputs": params_json(inputs), "stateMutability": "nonpayable" })
}

fn event(name: &str, inputs: &[(&str, &str)]) -> Value {
    let inputs: Vec<Value> = inputs
        .iter()
        .map(|(name, kind)| json!({ "name": name, "type": kind, "indexed": false }))
        .collect();
    json!({ "type": "event", "name": name, "inputs": inputs, "anonymous": false })
}

fn artifact(name: &str, abi: Vec<Value>) -> Artifact {
    let mut creation = vec![0x60, 0x80];
    creation.extend(name.as_bytes());
    creation.push(0);
    let mut runtime = vec![0xfe];
    runtime.extend(name.as_bytes());
    serde_json::from_value(json!({
        "contractName": name,
        "abi": abi,
        "bytecode": format!("0x{}", hex::encode(creation)),
        "deployedBytecode": format!("0x{}", hex::encode(runtime)),
    }))
    .expect("fixture artifact")
}

fn ownable() -> Value {
    function("transferOwnership", &[("newOwner", "address")], &[])
}

/// Every contract the workflow touches, with just enough ABI.
pub fn fixture_artifacts() -> Vec<Artifact> {
    let register_scheme = function(
        "registerScheme",
        &[("_scheme", "address"), ("_paramsHash", "bytes32"), ("_permissions", "bytes4"), ("_avatar", "address")],
        &["bool"],
    );
    let mint = function("mint", &[("_to", "address"), ("_amount", "uint256")], &["bool"]);
    vec![
        artifact(
            "DAOToken",
            vec![
                constructor(&[("_name", "string"), ("_symbol", "string"), ("_cap", "uint256")]),
                mint.clone(),
                ownable(),
            ],
        ),
        artifact("Reputation", vec![mint, ownable()]),
        artifact(
            "Avatar",
            vec![
                constructor(&[("_orgName", "string"), ("_nativeToken", "address"), ("_nativeReputation", "address")]),
                function("nativeToken", &[], &["address"]),
                function("nativeReputation", &[], &["address"]),
                function("owner", &[], &["address"]),
                ownable(),
            ],
        ),
        artifact("Controller", vec![constructor(&[("_avatar", "address")]), register_scheme.clone()]),
        artifact("ControllerCreator", vec![]),
        artifact(
            "DaoCreator",
            vec![
                constructor(&[("_controllerCreator", "address")]),
                function(
                    "forgeOrg",
                    &[
                        ("_orgName", "string"),
                        ("_tokenName", "string"),
                        ("_tokenSymbol", "string"),
                        ("_founders", "address[]"),
                        ("_foundersTokenAmount", "uint256[]"),
                        ("_foundersReputationAmount", "uint256[]"),
                        ("_uController", "address"),
                        ("_cap", "uint256"),
                    ],
                    &["address"],
                ),
                function(
                    "addFounders",
                    &[
                        ("_avatar", "address"),
                        ("_founders", "address[]"),
                        ("_foundersTokenAmount", "uint256[]"),
                        ("_foundersReputationAmount", "uint256[]"),
                    ],
                    &["bool"],
                ),
                function(
                    "setSchemes",
                    &[
                        ("_avatar", "address"),
                        ("_schemesNames", "bytes32[]"),
                        ("_schemesData", "bytes"),
                        ("_schemesInitilizeDataLens", "uint256[]"),
                        ("_permissions", "bytes4[]"),
                        ("_metaData", "string"),
                    ],
                    &[],
                ),
                event("NewOrg", &[("_avatar", "address")]),
                event("SchemeInstance", &[("_scheme", "address"), ("_name", "string")]),
            ],
        ),
        artifact(
            "UController",
            vec![function("newOrganization", &[("_avatar", "address")], &[]), register_scheme],
        ),
        artifact(
            "GenesisProtocol",
            vec![
                constructor(&[("_stakingToken", "address")]),
                function("setParameters", &[("_params", "uint256[11]"), ("_voteOnBehalf", "address")], &["bytes32"]),
                function("parameters", &[("_hash", "bytes32")], &["uint256"]),
            ],
        ),
        artifact(
            "SchemeRegistrar",
            vec![function(
                "initialize",
                &[
                    ("_avatar", "address"),
                    ("_votingMachine", "address"),
                    ("_voteRegisterParams", "bytes32"),
                    ("_voteRemoveParams", "bytes32"),
                ],
                &[],
            )],
        ),
        artifact("UpgradeScheme", vec![]),
        artifact("GlobalConstraintRegistrar", vec![]),
        artifact(
            "ContributionReward",
            vec![function(
                "initialize",
                &[("_avatar", "address"), ("_votingMachine", "address"), ("_voteParams", "bytes32")],
                &[],
            )],
        ),
        artifact("AbsoluteVote", vec![]),
        artifact("QuorumVote", vec![]),
        artifact("TokenCapGC", vec![]),
        artifact("VestingScheme", vec![]),
        artifact(
            "VoteInOrganizationScheme",
            vec![function(
                "setParameters",
                &[("_voteParams", "bytes32"), ("_intVote", "address")],
                &["bytes32"],
            )],
        ),
        artifact("OrganizationRegister", vec![]),
        artifact(
            "Redeemer",
            vec![constructor(&[("_contributionReward", "address"), ("_genesisProtocol", "address")])],
        ),
        artifact("GenericScheme", vec![]),
        artifact(
            "DAORegistry",
            vec![
                function("propose", &[("_avatar", "address")], &[]),
                function("register", &[("_avatar", "address"), ("_name", "string")], &[]),
            ],
        ),
        artifact(
            "Wallet",
            vec![
                constructor(&[("_owner", "address")]),
                function("initialize", &[("_votingMachine", "address")], &[]),
                function("setLabel", &[("_label", "string")], &[]),
                ownable(),
            ],
        ),
    ]
}

pub fn registry() -> ArtifactRegistry {
    let mut registry = ArtifactRegistry::new(PackageVersion::from(VERSION));
    for a in fixture_artifacts() {
        registry.insert(a);
    }
    registry
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// How the next matching submission fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Never reached the node.
    Dropped,
    /// Mined and reverted.
    Revert,
    /// Mined successfully, but the receipt never arrives.
    LostReceipt,
}

/// A transaction the chain accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub to: Option<Address>,
    pub contract: ContractName,
    pub method: String,
    pub args: Vec<Token>,
}

#[derive(Debug, Clone, Copy)]
struct AvatarFacts {
    token: Address,
    reputation: Address,
    owner: Address,
}

pub struct FakeChain {
    artifacts: Vec<Artifact>,
    contracts: HashMap<Address, ContractName>,
    code: HashMap<Address, Bytes>,
    avatars: HashMap<Address, AvatarFacts>,
    voting_params: BTreeSet<Bytes32>,
    next_address: u64,
    nonce: u64,
    block: u64,
    attempts: usize,
    fail_at: Option<(usize, Failure)>,
    pub submissions: Vec<Submission>,
    pub founders_registered: usize,
}

fn rpc_error(message: impl Into<String>) -> GatewayError {
    GatewayError::Rpc {
        code: -32000,
        message: message.into(),
    }
}

fn input_types(params: &[Param]) -> Vec<ParamType> {
    params.iter().map(|p| p.kind.clone()).collect()
}

fn array_len(token: &Token) -> usize {
    match token {
        Token::Array(items) => items.len(),
        _ => 0,
    }
}

fn address_arg(args: &[Token], i: usize) -> Address {
    args.get(i).and_then(token_address).expect("address argument")
}

impl FakeChain {
    pub fn new() -> Self {
        Self {
            artifacts: fixture_artifacts(),
            contracts: HashMap::new(),
            code: HashMap::new(),
            avatars: HashMap::new(),
            voting_params: BTreeSet::new(),
            next_address: 0x1000,
            nonce: 0,
            block: 0,
            attempts: 0,
            fail_at: None,
            submissions: Vec::new(),
            founders_registered: 0,
        }
    }

    /// Fail the `n`-th submission attempt from now (0 = the next one).
    pub fn fail_after(&mut self, n: usize, failure: Failure) {
        self.fail_at = Some((self.attempts + n, failure));
    }

    /// Transactions the deployer sent behind the tool's back.
    pub fn send_unrelated(&mut self, count: u64) {
        self.nonce += count;
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Pretend a contract already lives at a fresh address.
    pub fn install(&mut self, name: &str) -> Address {
        self.create(&ContractName::from(name))
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.submissions.iter().filter(|s| s.method == method).count()
    }

    pub fn deployments(&self) -> usize {
        self.calls_to("constructor")
    }

    fn artifact(&self, name: &ContractName) -> Artifact {
        self.artifacts
            .iter()
            .find(|a| &a.contract_name == name)
            .cloned()
            .expect("fixture artifact for contract")
    }

    fn create(&mut self, name: &ContractName) -> Address {
        self.next_address += 1;
        let address = Address::from(H160::from_low_u64_be(self.next_address));
        let runtime = self.artifact(name).deployed_bytecode;
        self.code.insert(address, runtime);
        self.contracts.insert(address, name.clone());
        address
    }

    fn log(&self, emitter: Address, contract: &str, event: &str, data: &[Token]) -> Log {
        let artifact = self.artifact(&ContractName::from(contract));
        let event = artifact.event(event).expect("fixture event");
        Log {
            address: emitter,
            topics: vec![abi::event_topic(event)],
            data: Bytes::from(encode(data)),
        }
    }

    fn lookup(&self, to: Address, data: &[u8]) -> Result<(ContractName, String, Vec<Token>), GatewayError> {
        let contract = self
            .contracts
            .get(&to)
            .cloned()
            .ok_or_else(|| rpc_error(format!("no contract at {to}")))?;
        let artifact = self.artifact(&contract);
        let function = artifact
            .abi
            .functions()
            .find(|f| data.len() >= 4 && f.short_signature() == data[..4])
            .ok_or_else(|| rpc_error(format!("{contract}: unknown selector")))?;
        let args = decode(&input_types(&function.inputs), &data[4..]).map_err(|e| rpc_error(e.to_string()))?;
        Ok((contract, function.name.clone(), args))
    }

    /// Hash a `setParameters` call returns for `args`.
    pub fn params_hash(args: &[Token]) -> Bytes32 {
        Bytes32::from(H256(keccak256(encode(args))))
    }

    fn apply(&mut self, to: Option<Address>, data: &[u8]) -> Result<(Option<Address>, Vec<Log>), GatewayError> {
        let Some(to) = to else {
            let artifact = self
                .artifacts
                .iter()
                .find(|a| !a.bytecode.is_empty() && data.starts_with(&a.bytecode))
                .cloned()
                .ok_or_else(|| rpc_error("unknown creation code"))?;
            let types = artifact
                .abi
                .constructor
                .as_ref()
                .map(|c| input_types(&c.inputs))
                .unwrap_or_default();
            let args = decode(&types, &data[artifact.bytecode.len()..]).map_err(|e| rpc_error(e.to_string()))?;
            let address = self.create(&artifact.contract_name);
            if artifact.contract_name.as_str() == "Avatar" {
                self.avatars.insert(
                    address,
                    AvatarFacts {
                        token: address_arg(&args, 1),
                        reputation: address_arg(&args, 2),
                        owner: Address::ZERO,
                    },
                );
            }
            self.submissions.push(Submission {
                to: None,
                contract: artifact.contract_name,
                method: "constructor".into(),
                args,
            });
            return Ok((Some(address), Vec::new()));
        };

        let (contract, method, args) = self.lookup(to, data)?;
        let mut logs = Vec::new();
        match (contract.as_str(), method.as_str()) {
            ("DaoCreator", "forgeOrg") => {
                let token = self.install("DAOToken");
                let reputation = self.install("Reputation");
                let avatar = self.install("Avatar");
                let universal = address_arg(&args, 6);
                let controller = if universal.is_zero() { self.install("Controller") } else { universal };
                self.avatars.insert(
                    avatar,
                    AvatarFacts {
                        token,
                        reputation,
                        owner: controller,
                    },
                );
                self.founders_registered += array_len(&args[3]);
                logs.push(self.log(to, "DaoCreator", "NewOrg", &[address_token(avatar)]));
            }
            ("DaoCreator", "addFounders") => {
                self.founders_registered += array_len(&args[1]);
            }
            ("DaoCreator", "setSchemes") => {
                let Token::Array(names) = &args[1] else {
                    return Err(rpc_error("setSchemes: bad names"));
                };
                for name in names.clone() {
                    let Token::FixedBytes(word) = name else {
                        return Err(rpc_error("setSchemes: bad name"));
                    };
                    let text: String = word.iter().take_while(|b| **b != 0).map(|b| *b as char).collect();
                    let scheme = self.install(&text);
                    logs.push(self.log(
                        to,
                        "DaoCreator",
                        "SchemeInstance",
                        &[address_token(scheme), Token::String(text)],
                    ));
                }
            }
            ("GenesisProtocol", "setParameters") => {
                self.voting_params.insert(Self::params_hash(&args));
            }
            ("Avatar", "transferOwnership") => {
                if let Some(facts) = self.avatars.get_mut(&to) {
                    facts.owner = address_arg(&args, 0);
                }
            }
            _ => {}
        }
        self.submissions.push(Submission {
            to: Some(to),
            contract,
            method,
            args,
        });
        Ok((None, logs))
    }
}

impl LedgerGateway for FakeChain {
    fn send_raw(&mut self, to: Option<Address>, data: &[u8]) -> Result<Receipt, GatewayError> {
        let attempt = self.attempts;
        self.attempts += 1;
        let failure = match self.fail_at {
            Some((n, f)) if n == attempt => {
                self.fail_at = None;
                Some(f)
            }
            _ => None,
        };
        if failure == Some(Failure::Dropped) {
            return Err(GatewayError::Transport("connection reset by peer".into()));
        }
        self.nonce += 1;
        let tx_hash = Bytes32::from(H256(keccak256([&self.nonce.to_be_bytes()[..], data].concat())));
        if failure == Some(Failure::Revert) {
            return Err(GatewayError::Reverted { tx_hash });
        }
        let (contract_address, logs) = self.apply(to, data)?;
        self.block += 1;
        if failure == Some(Failure::LostReceipt) {
            return Err(GatewayError::Timeout { tx_hash, secs: 750 });
        }
        Ok(Receipt {
            tx_hash,
            block_number: self.block,
            gas_used: 21_000,
            status: true,
            contract_address,
            logs,
        })
    }

    fn call_raw(&mut self, to: Address, data: &[u8]) -> Result<Bytes, GatewayError> {
        let (contract, method, args) = self.lookup(to, data)?;
        let out = match (contract.as_str(), method.as_str()) {
            ("Avatar", m) => {
                let facts = self.avatars.get(&to).copied().ok_or_else(|| rpc_error("unknown avatar"))?;
                let value = match m {
                    "nativeToken" => facts.token,
                    "nativeReputation" => facts.reputation,
                    "owner" => facts.owner,
                    other => return Err(rpc_error(format!("Avatar.{other} is not a view"))),
                };
                vec![address_token(value)]
            }
            (_, "setParameters") => vec![bytes32_token(Self::params_hash(&args))],
            ("GenesisProtocol", "parameters") => {
                let hash = token_bytes32(&args[0]).ok_or_else(|| rpc_error("bad hash"))?;
                vec![Token::Uint(U256::from(u8::from(self.voting_params.contains(&hash))))]
            }
            _ => return Err(rpc_error("execution reverted")),
        };
        Ok(Bytes::from(encode(&out)))
    }

    fn get_code(&mut self, address: Address) -> Result<Bytes, GatewayError> {
        Ok(self.code.get(&address).cloned().unwrap_or_default())
    }

    fn get_transaction_count(&mut self, _account: Address) -> Result<u64, GatewayError> {
        Ok(self.nonce)
    }
}

// ---------------------------------------------------------------------------
// Parameters and runs
// ---------------------------------------------------------------------------

pub fn founder_address(i: usize) -> Address {
    let mut bytes = [0u8; 20];
    bytes[0] = 0xf0;
    bytes[12..].copy_from_slice(&(i as u64).to_be_bytes());
    Address::from(H160(bytes))
}

/// A document exercising every stage: founders, one voting parameter set,
/// two modules, a stand-alone contract with hooks, a post-install hook and
/// the registry listing.
pub fn full_params(founders: usize, mode: &str) -> MigrationParams {
    let founders: Vec<Value> = (0..founders)
        .map(|i| json!({ "address": founder_address(i).to_string(), "tokens": 10, "reputation": 10 }))
        .collect();
    serde_json::from_value(json!({
        "org_name": "Test DAO",
        "token_cap": 0,
        "founders": founders,
        "mode": mode,
        "register_in_dao_registry": true,
        "voting_machines_params": [{
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
        }],
        "modules": [
            {
                "name": "SchemeRegistrar",
                "permissions": "0x0000001F",
                "params": [
                    { "well_known": "avatar" },
                    { "well_known": "voting_machine" },
                    { "voting_params": 0 },
                    { "voting_params": null }
                ]
            },
            {
                "name": "ContributionReward",
                "permissions": "0x00000000",
                "params": [
                    { "well_known": "avatar" },
                    { "well_known": "voting_machine" },
                    { "voting_params": null }
                ]
            }
        ],
        "stand_alone": [{
            "name": "Wallet",
            "constructor_params": [{ "well_known": "avatar" }],
            "initialize": { "method": "initialize", "params": [{ "package_contract": "GenesisProtocol" }] },
            "hooks": [{ "method": "setLabel", "params": ["treasury"] }]
        }],
        "post_install_hooks": [{
            "target": { "stand_alone": 0 },
            "method": "transferOwnership",
            "params": [{ "well_known": "avatar" }]
        }]
    }))
    .expect("fixture params")
}

/// Filesystem and configuration for one network.
pub struct Harness {
    pub home: TempDir,
    pub network_key: NetworkKey,
    pub network: NetworkConfig,
    pub artifacts: ArtifactRegistry,
    pub record_path: PathBuf,
}

impl Harness {
    pub fn private() -> Self {
        let mut network = NetworkConfig::new(
            "http://127.0.0.1:8545",
            Address::repeat_byte(0xde),
            PackageVersion::from(VERSION),
        );
        network.private = true;
        let home = TempDir::new().expect("home");
        let record_path = daomig_ledger::record::record_path_at(home.path());
        Self {
            home,
            network_key: NetworkKey::from("private"),
            network,
            artifacts: registry(),
            record_path,
        }
    }

    pub fn inputs<'a>(&'a self, params: &'a MigrationParams) -> MigrationInputs<'a> {
        MigrationInputs {
            network_key: &self.network_key,
            network: &self.network,
            params,
            artifacts: &self.artifacts,
            home: self.home.path(),
            record_path: &self.record_path,
        }
    }

    pub fn open<'a>(
        &'a self,
        chain: &'a mut FakeChain,
        params: &'a MigrationParams,
        options: MigrationOptions,
    ) -> Result<MigrationContext<'a, FakeChain>, daomig_engine::MigrateError> {
        MigrationContext::open(chain, self.inputs(params), options)
    }

    pub fn keep_state() -> MigrationOptions {
        MigrationOptions {
            keep_state: true,
            ..MigrationOptions::default()
        }
    }

    pub fn saved_state(&self) -> daomig_ledger::DeploymentState {
        daomig_ledger::store::load_at(self.home.path(), &self.network_key).expect("load state")
    }
}
