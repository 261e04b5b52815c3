//! `daomig reset --network <key>`

use anyhow::{Context, Result};
use clap::Args;

use daomig_core::NetworkKey;
use daomig_ledger::{store, RunLock};

/// Discard saved progress for a network. The deployment record is untouched.
#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Network key from the configuration file.
    #[arg(long, short = 'n')]
    pub network: String,
}

impl ResetArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let key = NetworkKey::from(self.network);

        let _lock = RunLock::acquire_at(&home, &key)?;
        let removed = store::clear_at(&home, &key)
            .with_context(|| format!("failed to clear state for network '{key}'"))?;

        if removed {
            println!("✓ Cleared saved state for network '{key}'");
        } else {
            println!("No saved state for network '{key}'");
        }
        Ok(())
    }
}
