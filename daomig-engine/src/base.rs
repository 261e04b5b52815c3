//! The base package: singleton contracts shared by every organization on a
//! network, in deployment order.

use serde_json::{json, Value};

use daomig_core::constants::BASE_TOKEN_NAME;
use daomig_core::{ContractName, WellKnown};

/// Contracts the workflow addresses by name.
pub mod names {
    pub const DAO_CREATOR: &str = "DaoCreator";
    pub const UCONTROLLER: &str = "UController";
    pub const CONTROLLER: &str = "Controller";
    pub const GENESIS_PROTOCOL: &str = "GenesisProtocol";
    pub const DAO_REGISTRY: &str = "DAORegistry";
    pub const AVATAR: &str = "Avatar";
    pub const DAO_TOKEN: &str = "DAOToken";
    pub const REPUTATION: &str = "Reputation";
}

/// Constructor argument of a base contract.
#[derive(Debug, Clone, PartialEq)]
pub enum BaseArg {
    /// Address of an earlier entry of the plan.
    Dependency(ContractName),
    Literal(Value),
}

/// One contract of the base package.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseContract {
    /// Name in the deployment record.
    pub name: ContractName,
    /// Artifact to deploy; differs from `name` only for the base token.
    pub artifact: ContractName,
    pub args: Vec<BaseArg>,
    /// Deployed only on private networks; elsewhere it must be pinned.
    pub private_only: bool,
}

impl BaseContract {
    fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            artifact: name.into(),
            args: Vec::new(),
            private_only: false,
        }
    }

    fn dep(mut self, name: &str) -> Self {
        self.args.push(BaseArg::Dependency(name.into()));
        self
    }

    /// Dependency names in argument order.
    pub fn dependencies(&self) -> impl Iterator<Item = &ContractName> {
        self.args.iter().filter_map(|a| match a {
            BaseArg::Dependency(n) => Some(n),
            BaseArg::Literal(_) => None,
        })
    }
}

/// Initial supply of the development base token: 100,000,000 tokens in wei.
const BASE_TOKEN_SUPPLY: &str = "100000000000000000000000000";

/// The ordered base package.
pub fn base_plan() -> Vec<BaseContract> {
    let token = BaseContract {
        name: BASE_TOKEN_NAME.into(),
        artifact: names::DAO_TOKEN.into(),
        args: vec![
            BaseArg::Literal(json!("DAOstack")),
            BaseArg::Literal(json!(BASE_TOKEN_NAME)),
            BaseArg::Literal(json!(BASE_TOKEN_SUPPLY)),
        ],
        private_only: true,
    };
    vec![
        token,
        BaseContract::new("ControllerCreator"),
        BaseContract::new(names::DAO_CREATOR).dep("ControllerCreator"),
        BaseContract::new(names::UCONTROLLER),
        BaseContract::new(names::GENESIS_PROTOCOL).dep(BASE_TOKEN_NAME),
        BaseContract::new("SchemeRegistrar"),
        BaseContract::new("UpgradeScheme"),
        BaseContract::new("GlobalConstraintRegistrar"),
        BaseContract::new("ContributionReward"),
        BaseContract::new("AbsoluteVote"),
        BaseContract::new("QuorumVote"),
        BaseContract::new("TokenCapGC"),
        BaseContract::new("VestingScheme"),
        BaseContract::new("VoteInOrganizationScheme"),
        BaseContract::new("OrganizationRegister"),
        BaseContract::new("Redeemer")
            .dep("ContributionReward")
            .dep(names::GENESIS_PROTOCOL),
        BaseContract::new("GenericScheme"),
        BaseContract::new(names::DAO_REGISTRY),
    ]
}

/// Artifact for a contract recorded under `name` in the base package.
pub fn artifact_for(name: &ContractName) -> ContractName {
    if name.as_str() == BASE_TOKEN_NAME {
        ContractName::from(names::DAO_TOKEN)
    } else {
        name.clone()
    }
}

/// Artifact behind a well-known placeholder; `None` for the zero address.
pub fn well_known_artifact(w: WellKnown, universal_controller: bool) -> Option<&'static str> {
    Some(match w {
        WellKnown::VotingMachine => names::GENESIS_PROTOCOL,
        WellKnown::Avatar => names::AVATAR,
        WellKnown::Controller if universal_controller => names::UCONTROLLER,
        WellKnown::Controller => names::CONTROLLER,
        WellKnown::NativeToken => names::DAO_TOKEN,
        WellKnown::NativeReputation => names::REPUTATION,
        WellKnown::ZeroAddress => return None,
    })
}
