//! `daomig status`: saved progress for one network.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use daomig_core::NetworkKey;
use daomig_ledger::{store, DeploymentState, Stage};

/// Arguments for `daomig status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Network key from the configuration file.
    #[arg(long, short = 'n')]
    pub network: String,

    /// Emit the raw state as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct StageRow {
    #[tabled(rename = "stage")]
    stage: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "progress")]
    progress: String,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let key = NetworkKey::from(self.network);
        let saved = store::state_path_at(&home, &key).exists();
        let state = store::load_at(&home, &key)
            .with_context(|| format!("failed to load state for network '{key}'"))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&state)?);
            return Ok(());
        }

        print_table(&key, &state, saved);
        Ok(())
    }
}

fn print_table(key: &NetworkKey, state: &DeploymentState, saved: bool) {
    let org = state.organization_name.as_deref().unwrap_or("-");
    println!("network {}  organization {}  stage {}", key.to_string().bold(), org, state.stage);
    if saved {
        println!("updated {}", format_age(state.updated_at));
    } else {
        println!("{}", "no saved state".dimmed());
    }

    let rows: Vec<StageRow> = Stage::all()
        .iter()
        .skip(1)
        .map(|stage| {
            let done = state.is_stage_complete(*stage);
            let indicator = if done { "■".green() } else { "■".bright_black() };
            let word = if done { "done" } else { "pending" };
            StageRow {
                stage: stage.label().to_string(),
                status: format!("{indicator} {word}"),
                progress: progress(state, *stage),
            }
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn progress(state: &DeploymentState, stage: Stage) -> String {
    match stage {
        Stage::PackageReady => format!("{} base contracts", state.base_addresses.len()),
        Stage::InstanceCreated => state
            .application_address
            .map(|a| format!("avatar {a}"))
            .unwrap_or_default(),
        Stage::FoundersAdded => state
            .founders
            .as_ref()
            .map(|f| format!("{}/{} in {} batches", f.added, f.total, f.batches_completed))
            .unwrap_or_default(),
        Stage::DaoRegistryRegistered => format!("{} steps", state.registry_steps.get()),
        Stage::VotingParamsSet => format!("{} hashes", state.voting_params_hashes.len()),
        Stage::StandAloneDeployed => {
            let initialized = state.stand_alone.iter().filter(|s| s.initialized).count();
            format!("{} deployed, {initialized} initialized", state.stand_alone.len())
        }
        Stage::ModulesDescribed => format!("{} modules", state.module_registrations.len()),
        Stage::ModulesRegistered => {
            let registered = state.module_registrations.iter().filter(|m| m.registered).count();
            format!("{registered}/{} registered", state.module_registrations.len())
        }
        Stage::PostRegistrationHooks => format!("{} hooks", state.post_hooks.get()),
        Stage::Started | Stage::Finalized => String::new(),
    }
}

fn format_age(at: DateTime<Utc>) -> String {
    let secs = (Utc::now() - at).num_seconds().max(0);
    match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}
