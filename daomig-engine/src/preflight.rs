//! Checks of the parameter document against the base package and the loaded
//! artifacts. They run when a context opens, before the run lock and before
//! any transaction, so a typo never surfaces halfway through a paid run.

use std::collections::BTreeSet;

use daomig_core::{ConfigError, ContractName, ContractRef, DeploymentMode, MigrationParams, ParamRef, VotingParamsSpec};

use crate::artifacts::{Artifact, ArtifactRegistry};
use crate::base::{artifact_for, base_plan, names, well_known_artifact};
use crate::error::MigrateError;

/// Validate every name and call arity the run will need.
pub fn check(params: &MigrationParams, artifacts: &ArtifactRegistry) -> Result<(), MigrateError> {
    for name in workflow_artifacts(params) {
        artifacts.get(&ContractName::from(name))?;
    }

    let package: BTreeSet<ContractName> = base_plan().into_iter().map(|c| c.name).collect();
    for (i, module) in params.modules.iter().enumerate() {
        let field = format!("modules[{i}].params");
        package_refs(&package, &field, &module.params)?;
        let artifact = lookup(artifacts, format!("modules[{i}].name"), &module.name)?;
        arity(&field, artifact, module.initializer(), module.params.len())?;
    }

    for (i, sa) in params.stand_alone.iter().enumerate() {
        let artifact = lookup(artifacts, format!("stand_alone[{i}].name"), &sa.name)?;

        let field = format!("stand_alone[{i}].constructor_params");
        package_refs(&package, &field, &sa.constructor_params)?;
        let expected = artifact.abi.constructor.as_ref().map_or(0, |c| c.inputs.len());
        if expected != sa.constructor_params.len() {
            return Err(ConfigError::invalid(
                field,
                format!(
                    "{} constructor takes {expected} argument(s), {} given",
                    sa.name,
                    sa.constructor_params.len()
                ),
            )
            .into());
        }

        if let Some(init) = &sa.initialize {
            let field = format!("stand_alone[{i}].initialize.params");
            package_refs(&package, &field, &init.params)?;
            arity(&field, artifact, &init.method, init.params.len())?;
        }
        for (h, hook) in sa.hooks.iter().enumerate() {
            let field = format!("stand_alone[{i}].hooks[{h}].params");
            package_refs(&package, &field, &hook.params)?;
            arity(&field, artifact, &hook.method, hook.params.len())?;
        }
    }

    for (h, hook) in params.post_install_hooks.iter().enumerate() {
        let target_field = format!("post_install_hooks[{h}].target");
        let field = format!("post_install_hooks[{h}].params");
        package_refs(&package, &field, &hook.params)?;
        let name = match &hook.target {
            ContractRef::StandAlone(j) => params.stand_alone.get(*j).map(|s| s.name.clone()),
            ContractRef::Module(k) => params.modules.get(*k).map(|m| m.name.clone()),
            ContractRef::PackageContract(name) => {
                if !package.contains(name) {
                    return Err(unknown_package_contract(target_field, name).into());
                }
                Some(artifact_for(name))
            }
            ContractRef::WellKnown(w) => {
                well_known_artifact(*w, params.use_universal_controller).map(ContractName::from)
            }
        };
        let name = name.ok_or_else(|| ConfigError::invalid(&target_field, "does not name a contract"))?;
        let artifact = lookup(artifacts, target_field, &name)?;
        arity(&field, artifact, &hook.method, hook.params.len())?;
    }
    Ok(())
}

/// Artifacts the stages address by name for this document.
fn workflow_artifacts(params: &MigrationParams) -> Vec<&'static str> {
    let mut required = match params.mode {
        DeploymentMode::Factory => vec![names::DAO_CREATOR, names::AVATAR],
        DeploymentMode::Controller => {
            let controller = if params.use_universal_controller {
                names::UCONTROLLER
            } else {
                names::CONTROLLER
            };
            vec![names::DAO_TOKEN, names::REPUTATION, names::AVATAR, controller]
        }
    };
    if params
        .voting_machines_params
        .iter()
        .any(|v| matches!(v, VotingParamsSpec::Parameters(_)))
    {
        required.push(names::GENESIS_PROTOCOL);
    }
    if params.register_in_dao_registry {
        required.push(names::DAO_REGISTRY);
    }
    required
}

fn lookup<'r>(artifacts: &'r ArtifactRegistry, field: String, name: &ContractName) -> Result<&'r Artifact, ConfigError> {
    artifacts
        .get(name)
        .map_err(|e| ConfigError::invalid(field, e.to_string()))
}

fn unknown_package_contract(field: impl Into<String>, name: &ContractName) -> ConfigError {
    ConfigError::invalid(field, format!("package contract {name} is not part of the base package"))
}

fn package_refs(package: &BTreeSet<ContractName>, field: &str, refs: &[ParamRef]) -> Result<(), ConfigError> {
    for (p, r) in refs.iter().enumerate() {
        if let ParamRef::PackageContract(name) = r {
            if !package.contains(name) {
                return Err(unknown_package_contract(format!("{field}[{p}]"), name));
            }
        }
    }
    Ok(())
}

fn arity(field: &str, artifact: &Artifact, method: &str, count: usize) -> Result<(), ConfigError> {
    artifact
        .function(method, count)
        .map(|_| ())
        .map_err(|e| ConfigError::invalid(field, e.to_string()))
}
