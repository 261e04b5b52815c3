//! `daomig migrate --network <key> --params <file> --artifacts <dir>`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use daomig_core::{config, ContractName, MigrationParams, NetworkKey};
use daomig_engine::{
    ArtifactRegistry, MigrationContext, MigrationInputs, MigrationOptions, ReusePolicy,
};
use daomig_ledger::{record, DaoRecord};

use crate::rpc::RpcGateway;

/// Deploy (or resume deploying) the organization described by `--params`.
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Network key from the configuration file.
    #[arg(long, short = 'n')]
    pub network: String,

    /// Parameter document (JSON, or YAML for .yaml/.yml files).
    #[arg(long)]
    pub params: PathBuf,

    /// Directory holding one sub-directory of artifacts per package version.
    #[arg(long)]
    pub artifacts: PathBuf,

    /// Extra artifacts for custom modules.
    #[arg(long)]
    pub custom_abis: Option<PathBuf>,

    /// Deploy this base contract fresh even if a reusable one is recorded.
    #[arg(long, value_name = "NAME")]
    pub redeploy: Vec<String>,

    /// Continue a saved run although the parameter document changed.
    #[arg(long)]
    pub allow_param_change: bool,

    /// Continue although the deployer sent transactions the saved state does not know about.
    #[arg(long)]
    pub accept_unrecorded_nonce: bool,

    /// Keep the state file after the run finalizes.
    #[arg(long)]
    pub keep_state: bool,

    /// Configuration file (default: ~/.daomig/config.yaml).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Deployment record (default: ~/.daomig/migration.json).
    #[arg(long)]
    pub record: Option<PathBuf>,
}

impl MigrateArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let config_path = self
            .config
            .clone()
            .unwrap_or_else(|| config::config_path_at(&home));
        let record_path = self
            .record
            .clone()
            .unwrap_or_else(|| record::record_path_at(&home));

        let key = NetworkKey::from(self.network.clone());
        let cfg = config::load_config(&config_path)
            .context("failed to load configuration; run `daomig init` first")?;
        let network = cfg.network(&key)?;

        let mut artifacts = ArtifactRegistry::open(&self.artifacts, &network.package_version)
            .context("failed to load contract artifacts")?;
        if let Some(dir) = &self.custom_abis {
            artifacts = artifacts
                .with_extra_dir(dir)
                .with_context(|| format!("failed to load custom artifacts from {}", dir.display()))?;
        }

        let params = MigrationParams::load(&self.params)
            .with_context(|| format!("failed to load parameters from {}", self.params.display()))?;

        let options = MigrationOptions {
            reuse: ReusePolicy {
                redeploy: self.redeploy.iter().map(|n| ContractName::from(n.as_str())).collect(),
            },
            allow_param_change: self.allow_param_change,
            accept_unrecorded_nonce: self.accept_unrecorded_nonce,
            keep_state: self.keep_state,
        };
        let inputs = MigrationInputs {
            network_key: &key,
            network,
            params: &params,
            artifacts: &artifacts,
            home: &home,
            record_path: &record_path,
        };

        let mut gateway = RpcGateway::new(network).context("failed to connect to the network")?;
        let mut ctx = MigrationContext::open(&mut gateway, inputs, options)?;
        let dao = ctx.run().map_err(|e| {
            anyhow::Error::new(e).context(format!(
                "migration stopped at stage '{}'; fix the cause and rerun to resume",
                ctx.state().stage
            ))
        })?;

        print_summary(&key, &dao);
        println!("  Record: {}", record_path.display());
        Ok(())
    }
}

fn print_summary(network: &NetworkKey, dao: &DaoRecord) {
    println!("✓ DAO '{}' deployed on {}", dao.name.bold(), network);
    println!("  {:<12} {}", "avatar".dimmed(), dao.avatar);
    println!("  {:<12} {}", "token".dimmed(), dao.dao_token);
    println!("  {:<12} {}", "reputation".dimmed(), dao.reputation);
    println!("  {:<12} {}", "controller".dimmed(), dao.controller);
    for scheme in &dao.schemes {
        println!("  {:<12} {} {}", "scheme".dimmed(), scheme.address, label(scheme.alias.as_deref(), &scheme.name));
    }
    for contract in &dao.stand_alone {
        println!(
            "  {:<12} {} {}",
            "stand-alone".dimmed(),
            contract.address,
            label(contract.alias.as_deref(), &contract.name)
        );
    }
    for hash in &dao.voting_params {
        println!("  {:<12} {}", "params".dimmed(), hash);
    }
}

fn label(alias: Option<&str>, name: &ContractName) -> String {
    match alias {
        Some(alias) => format!("{alias} ({name})"),
        None => name.to_string(),
    }
}
