//! Artifact Registry: compiled contracts of one package version.
//!
//! A package directory holds one pruned truffle artifact per contract:
//!
//! ```text
//! <root>/<version>/
//!   DaoCreator.json     { "contractName", "abi", "bytecode", "deployedBytecode" }
//!   GenesisProtocol.json
//! ```
//!
//! Lookup only; nothing here mutates after loading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use daomig_core::{Bytes, ContractName, PackageVersion};

use crate::abi::{self, Abi, Event, Function, Token};
use crate::error::{io_err, AbiError, ArtifactError};

/// ABI and bytecode of one contract.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: ContractName,
    #[serde(default)]
    pub abi: Abi,
    /// Creation code.
    #[serde(default)]
    pub bytecode: Bytes,
    /// Runtime code, as `eth_getCode` returns it after deployment.
    #[serde(default)]
    pub deployed_bytecode: Bytes,
}

impl Artifact {
    pub fn name(&self) -> &ContractName {
        &self.contract_name
    }

    pub fn function(&self, method: &str, arity: usize) -> Result<&Function, ArtifactError> {
        abi::function_by_arity(&self.abi, method, arity).ok_or_else(|| ArtifactError::NoSuchFunction {
            contract: self.contract_name.clone(),
            method: method.to_owned(),
            arity,
        })
    }

    pub fn event(&self, name: &str) -> Result<&Event, ArtifactError> {
        self.abi.event(name).map_err(|_| ArtifactError::NoSuchEvent {
            contract: self.contract_name.clone(),
            event: name.to_owned(),
        })
    }

    /// Creation code followed by the encoded constructor arguments.
    pub fn deploy_data(&self, args: &[Token]) -> Result<Vec<u8>, AbiError> {
        let method = format!("{} constructor", self.contract_name);
        let code = self.bytecode.to_vec();
        match &self.abi.constructor {
            Some(constructor) => {
                if args.len() != constructor.inputs.len() {
                    return Err(AbiError::ArgCount {
                        method,
                        expected: constructor.inputs.len(),
                        found: args.len(),
                    });
                }
                constructor.encode_input(code, args).map_err(|e| AbiError::Encode {
                    method,
                    reason: e.to_string(),
                })
            }
            None if args.is_empty() => Ok(code),
            None => Err(AbiError::ArgCount {
                method,
                expected: 0,
                found: args.len(),
            }),
        }
    }

    /// Coerce JSON constructor arguments.
    pub fn constructor_args(&self, values: &[Value]) -> Result<Vec<Token>, AbiError> {
        let inputs = self.abi.constructor.as_ref().map(|c| c.inputs.as_slice()).unwrap_or_default();
        abi::coerce_params(&format!("{} constructor", self.contract_name), inputs, values)
    }

    fn load(path: &Path) -> Result<Self, ArtifactError> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        serde_json::from_str(&contents).map_err(|source| ArtifactError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// All artifacts of one package version, plus any custom module artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactRegistry {
    version: PackageVersion,
    artifacts: BTreeMap<ContractName, Artifact>,
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>, ArtifactError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let path = entry.map_err(|e| io_err(dir, e))?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

impl ArtifactRegistry {
    /// Load every `*.json` artifact in `<root>/<version>/`.
    pub fn open(root: &Path, version: &PackageVersion) -> Result<Self, ArtifactError> {
        let dir = root.join(version.as_str());
        if !dir.is_dir() {
            return Err(ArtifactError::VersionNotFound {
                root: root.to_path_buf(),
                version: version.clone(),
            });
        }
        let mut registry = Self::new(version.clone());
        for path in json_files(&dir)? {
            let artifact = Artifact::load(&path)?;
            registry.artifacts.insert(artifact.contract_name.clone(), artifact);
        }
        debug!(version = %version, count = registry.artifacts.len(), "loaded package artifacts");
        Ok(registry)
    }

    /// An empty registry, filled with [`ArtifactRegistry::insert`].
    pub fn new(version: PackageVersion) -> Self {
        Self {
            version,
            artifacts: BTreeMap::new(),
        }
    }

    /// Add custom artifacts from `dir`; a name already present is an error.
    pub fn with_extra_dir(mut self, dir: &Path) -> Result<Self, ArtifactError> {
        for path in json_files(dir)? {
            let artifact = Artifact::load(&path)?;
            if self.artifacts.contains_key(&artifact.contract_name) {
                return Err(ArtifactError::Duplicate {
                    name: artifact.contract_name,
                    path,
                });
            }
            self.artifacts.insert(artifact.contract_name.clone(), artifact);
        }
        Ok(self)
    }

    pub fn insert(&mut self, artifact: Artifact) {
        self.artifacts.insert(artifact.contract_name.clone(), artifact);
    }

    pub fn get(&self, name: &ContractName) -> Result<&Artifact, ArtifactError> {
        self.artifacts.get(name).ok_or_else(|| ArtifactError::NotFound {
            name: name.clone(),
            version: self.version.clone(),
        })
    }

    pub fn version(&self) -> &PackageVersion {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_artifact(dir: &Path, name: &str) {
        std::fs::create_dir_all(dir).unwrap();
        let artifact = json!({
            "contractName": name,
            "abi": [
                { "type": "constructor", "inputs": [{ "name": "_token", "type": "address" }], "stateMutability": "nonpayable" },
                { "type": "function", "name": "nativeToken", "inputs": [],
                  "outputs": [{ "name": "", "type": "address" }], "stateMutability": "view" }
            ],
            "bytecode": "0x6080",
            "deployedBytecode": "0x60806040"
        });
        std::fs::write(dir.join(format!("{name}.json")), artifact.to_string()).unwrap();
    }

    #[test]
    fn open_loads_every_artifact() {
        let root = TempDir::new().unwrap();
        let version = PackageVersion::from("0.0.1-rc.32");
        write_artifact(&root.path().join("0.0.1-rc.32"), "Avatar");
        write_artifact(&root.path().join("0.0.1-rc.32"), "DaoCreator");
        std::fs::write(root.path().join("0.0.1-rc.32").join("README.md"), "ignored").unwrap();

        let registry = ArtifactRegistry::open(root.path(), &version).unwrap();
        assert_eq!(registry.len(), 2);
        let avatar = registry.get(&"Avatar".into()).unwrap();
        assert_eq!(avatar.deployed_bytecode.to_string(), "0x60806040");
        assert!(avatar.function("nativeToken", 0).is_ok());
        assert!(matches!(
            avatar.function("nativeToken", 1),
            Err(ArtifactError::NoSuchFunction { .. })
        ));
    }

    #[test]
    fn missing_version_is_a_precondition_failure() {
        let root = TempDir::new().unwrap();
        let err = ArtifactRegistry::open(root.path(), &"9.9.9".into()).unwrap_err();
        assert!(matches!(err, ArtifactError::VersionNotFound { .. }));
    }

    #[test]
    fn unknown_name_is_not_found() {
        let registry = ArtifactRegistry::new("v1".into());
        assert!(matches!(
            registry.get(&"Nope".into()),
            Err(ArtifactError::NotFound { .. })
        ));
    }

    #[test]
    fn extra_dir_rejects_collisions() {
        let root = TempDir::new().unwrap();
        let version = PackageVersion::from("v1");
        write_artifact(&root.path().join("v1"), "Avatar");
        write_artifact(&root.path().join("custom"), "RepAllocation");
        let registry = ArtifactRegistry::open(root.path(), &version)
            .unwrap()
            .with_extra_dir(&root.path().join("custom"))
            .unwrap();
        assert!(registry.get(&"RepAllocation".into()).is_ok());

        write_artifact(&root.path().join("clash"), "Avatar");
        let err = ArtifactRegistry::open(root.path(), &version)
            .unwrap()
            .with_extra_dir(&root.path().join("clash"))
            .unwrap_err();
        assert!(matches!(err, ArtifactError::Duplicate { .. }));
    }

    #[test]
    fn deploy_data_appends_constructor_args() {
        let root = TempDir::new().unwrap();
        write_artifact(&root.path().join("v1"), "Avatar");
        let registry = ArtifactRegistry::open(root.path(), &"v1".into()).unwrap();
        let avatar = registry.get(&"Avatar".into()).unwrap();
        let args = avatar
            .constructor_args(&[json!("0x1111111111111111111111111111111111111111")])
            .unwrap();
        let data = avatar.deploy_data(&args).unwrap();
        assert_eq!(&data[..2], &[0x60, 0x80]);
        assert_eq!(data.len(), 2 + 32);
        assert!(avatar.deploy_data(&[]).is_err());
        assert!(avatar.constructor_args(&[json!("0x1111111111111111111111111111111111111111"), json!(1)]).is_err());
    }

    #[test]
    fn artifact_without_constructor_deploys_bare_code() {
        let artifact: Artifact = serde_json::from_value(json!({
            "contractName": "Reputation",
            "abi": [],
            "bytecode": "0x6080"
        }))
        .unwrap();
        assert_eq!(artifact.deploy_data(&[]).unwrap(), vec![0x60, 0x80]);
        assert!(artifact.deployed_bytecode.is_empty());
        assert!(artifact.constructor_args(&[json!(1)]).is_err());
        assert!(matches!(artifact.event("Mint"), Err(ArtifactError::NoSuchEvent { .. })));
    }
}
