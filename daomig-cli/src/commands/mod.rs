pub mod init;
pub mod migrate;
pub mod record;
pub mod reset;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};

/// Home directory holding `.daomig/`. Tests point `HOME` at a temp dir.
pub(crate) fn home() -> Result<PathBuf> {
    daomig_core::config::home().context("could not determine home directory")
}
