//! `daomig init --network <key> --rpc-url <url> --deployer <address> --package-version <v>`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use daomig_core::{
    config::{self, upsert_network},
    Address, NetworkConfig, NetworkKey, PackageVersion,
};

/// Add or replace one network entry in the configuration file.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Network key used by every other command (e.g. "mainnet", "ganache").
    #[arg(long, short = 'n')]
    pub network: String,

    /// JSON-RPC endpoint of a node that manages the deployer account.
    #[arg(long)]
    pub rpc_url: String,

    /// Node-managed account that signs every transaction.
    #[arg(long)]
    pub deployer: Address,

    /// Contract package version to deploy (a directory under --artifacts).
    #[arg(long)]
    pub package_version: String,

    /// Private network: contracts only deployable on private chains are allowed.
    #[arg(long)]
    pub private: bool,

    /// Founders added by the creation transaction.
    #[arg(long, value_name = "N")]
    pub initial_founders_batch: Option<usize>,

    /// Founders per follow-up batch.
    #[arg(long, value_name = "N")]
    pub founders_batch: Option<usize>,

    /// Configuration file (default: ~/.daomig/config.yaml).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let path = match self.config {
            Some(path) => path,
            None => config::config_path_at(&super::home()?),
        };
        let key = NetworkKey::from(self.network);

        let mut network = NetworkConfig::new(
            self.rpc_url,
            self.deployer,
            PackageVersion::from(self.package_version),
        );
        network.private = self.private;
        if let Some(n) = self.initial_founders_batch {
            network.batches.initial_founders = n;
        }
        if let Some(n) = self.founders_batch {
            network.batches.founders = n;
        }

        // Pinned contracts are edited by hand; replacing an entry keeps them.
        if path.exists() {
            let existing = config::load_config(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            if let Some(previous) = existing.networks.get(&key) {
                network.pinned_contracts = previous.pinned_contracts.clone();
            }
        }

        upsert_network(&path, key.clone(), network)
            .with_context(|| format!("failed to save network '{key}'"))?;

        println!("✓ Configured network '{key}'");
        println!("  Saved to: {}", path.display());
        Ok(())
    }
}
