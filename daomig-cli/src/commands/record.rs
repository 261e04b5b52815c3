//! `daomig record [--network <key>]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use daomig_core::NetworkKey;
use daomig_ledger::record;

/// Print the deployment record as JSON.
#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Only print this network's entry.
    #[arg(long, short = 'n')]
    pub network: Option<String>,

    /// Deployment record (default: ~/.daomig/migration.json).
    #[arg(long)]
    pub record: Option<PathBuf>,
}

impl RecordArgs {
    pub fn run(self) -> Result<()> {
        let path = match self.record {
            Some(path) => path,
            None => record::record_path_at(&super::home()?),
        };
        let record = record::load_record(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        let json = match self.network {
            Some(network) => {
                let key = NetworkKey::from(network);
                let entry = record
                    .network(&key)
                    .with_context(|| format!("no deployments recorded for network '{key}'"))?;
                serde_json::to_string_pretty(entry)?
            }
            None => serde_json::to_string_pretty(&record)?,
        };
        println!("{json}");
        Ok(())
    }
}
