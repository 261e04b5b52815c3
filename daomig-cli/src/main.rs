//! daomig: resumable DAO deployment CLI.
//!
//! # Usage
//!
//! ```text
//! daomig init --network <key> --rpc-url <url> --deployer <address> --package-version <v>
//! daomig migrate --network <key> --params <file> --artifacts <dir> [--redeploy <Name>]...
//! daomig status --network <key> [--json]
//! daomig reset --network <key>
//! daomig record [--network <key>]
//! ```

mod commands;
mod rpc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    init::InitArgs, migrate::MigrateArgs, record::RecordArgs, reset::ResetArgs, status::StatusArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "daomig",
    version,
    about = "Deploy a DAO and its base contract package, resuming after any failure",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add or replace a network entry in the configuration file.
    Init(InitArgs),

    /// Deploy (or resume deploying) a DAO described by a parameter document.
    Migrate(MigrateArgs),

    /// Show saved progress for a network.
    Status(StatusArgs),

    /// Discard saved progress so the next migrate starts over.
    Reset(ResetArgs),

    /// Print the deployment record.
    Record(RecordArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Migrate(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Reset(args) => args.run(),
        Commands::Record(args) => args.run(),
    }
}
