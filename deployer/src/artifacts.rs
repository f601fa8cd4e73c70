//! Loading and caching of contract artifacts.
//!
//! Each contract's artifact lives at `<dir>/<Contract>.json`, either as a
//! bare ABI array (the ABI-exporter layout) or as a compiler artifact
//! object carrying the creation bytecode alongside the ABI. Artifacts are
//! parsed once per contract name and cached for the process lifetime.

use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use ethers::{
    abi::{Abi, Address},
    contract::{Contract, ContractFactory},
    providers::Middleware,
    types::Bytes,
    utils::hex::FromHex,
};
use serde::Deserialize;

use crate::errors::ScriptError;

/// A loaded contract artifact
#[derive(Clone)]
pub struct Artifact {
    /// The contract ABI
    pub abi: Abi,
    /// The creation bytecode, absent for ABI-only artifacts
    pub bytecode: Option<Bytes>,
}

/// The object form of a compiler artifact
#[derive(Deserialize)]
struct ArtifactJson {
    /// The contract ABI
    abi: Abi,
    /// Hex-encoded creation bytecode
    #[serde(default)]
    bytecode: Option<String>,
}

/// Loads contract ABIs and bytecode from a directory of artifacts,
/// caching each parsed artifact for the process lifetime
pub struct ArtifactStore {
    /// The directory holding one `<Contract>.json` per contract
    dir: PathBuf,
    /// Parsed artifacts by contract name
    cache: Mutex<HashMap<String, Artifact>>,
}

impl ArtifactStore {
    /// Create a store over the given artifacts directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Load the artifact for `contract`, hitting the cache first
    pub fn load(&self, contract: &str) -> Result<Artifact, ScriptError> {
        // Only a panicking holder can poison the lock
        if let Some(artifact) = self.cache.lock().unwrap().get(contract) {
            return Ok(artifact.clone());
        }

        let path = self.dir.join(format!("{contract}.json"));
        let contents = fs::read_to_string(&path)
            .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {e}", path.display())))?;
        let artifact = parse_artifact(&contents)?;

        self.cache
            .lock()
            .unwrap()
            .insert(contract.to_string(), artifact.clone());
        Ok(artifact)
    }

    /// The ABI for `contract`
    pub fn abi(&self, contract: &str) -> Result<Abi, ScriptError> {
        self.load(contract).map(|artifact| artifact.abi)
    }

    /// A deployment factory for `contract`.
    ///
    /// Requires an artifact that carries bytecode.
    pub fn factory<M: Middleware>(
        &self,
        contract: &str,
        client: Arc<M>,
    ) -> Result<ContractFactory<M>, ScriptError> {
        let artifact = self.load(contract)?;
        let bytecode = artifact.bytecode.ok_or_else(|| {
            ScriptError::ArtifactParsing(format!("artifact for {contract} carries no bytecode"))
        })?;

        Ok(ContractFactory::new(artifact.abi, bytecode, client))
    }

    /// Bind the interface of `contract` at an already-deployed `address`
    pub fn attach<M: Middleware>(
        &self,
        contract: &str,
        address: Address,
        client: Arc<M>,
    ) -> Result<Contract<M>, ScriptError> {
        Ok(Contract::new(address, self.abi(contract)?, client))
    }
}

/// Parse artifact file contents in either the bare-ABI-array or the
/// compiler-artifact-object form
fn parse_artifact(contents: &str) -> Result<Artifact, ScriptError> {
    let value: serde_json::Value =
        serde_json::from_str(contents).map_err(|e| ScriptError::ArtifactParsing(e.to_string()))?;

    if value.is_array() {
        let abi: Abi = serde_json::from_value(value)
            .map_err(|e| ScriptError::ArtifactParsing(e.to_string()))?;
        return Ok(Artifact {
            abi,
            bytecode: None,
        });
    }

    let parsed: ArtifactJson =
        serde_json::from_value(value).map_err(|e| ScriptError::ArtifactParsing(e.to_string()))?;
    let bytecode = parsed
        .bytecode
        .map(|encoded| {
            let stripped = encoded.strip_prefix("0x").unwrap_or(&encoded);
            Bytes::from_hex(stripped).map_err(|e| ScriptError::ArtifactParsing(e.to_string()))
        })
        .transpose()?;

    Ok(Artifact {
        abi: parsed.abi,
        bytecode,
    })
}
