//! Deployment of single contract instances.
//!
//! The [`Deployer`] carries the collaborators every deployment needs, the
//! RPC client, the artifact store, and the ledger of the target network,
//! so that nothing reaches for ambient state and two networks can never
//! share a ledger by accident.

use std::sync::Arc;

use ethers::{contract::Contract, providers::Middleware};
use serde_json::Value;
use tracing::info;

use crate::{
    artifacts::ArtifactStore,
    calldata::tokenize_inputs,
    constants::NUM_DEPLOY_CONFIRMATIONS,
    errors::ScriptError,
    ledger::{DeploymentLedger, DeploymentRecord},
    utils::parse_addr,
};

/// Orchestrates contract deployments against a single network, recording
/// each confirmed deployment in that network's ledger
pub struct Deployer<M> {
    /// The RPC client used to reach the target network
    client: Arc<M>,
    /// The store of contract artifacts
    artifacts: ArtifactStore,
    /// The deployment ledger of the target network
    ledger: DeploymentLedger,
}

impl<M: Middleware + 'static> Deployer<M> {
    /// Construct a deployer from its collaborators
    pub fn new(client: Arc<M>, artifacts: ArtifactStore, ledger: DeploymentLedger) -> Self {
        Self {
            client,
            artifacts,
            ledger,
        }
    }

    /// The RPC client
    pub fn client(&self) -> Arc<M> {
        self.client.clone()
    }

    /// The artifact store
    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// The deployment ledger
    pub fn ledger(&self) -> &DeploymentLedger {
        &self.ledger
    }

    /// Deploy `contract` with the given constructor argument strings and
    /// record the confirmed deployment under `key`.
    ///
    /// Failures are returned, never swallowed; a caller sequencing several
    /// deployments decides itself whether to halt or carry on.
    pub async fn deploy(
        &self,
        contract: &str,
        key: &str,
        args: &[String],
    ) -> Result<Contract<M>, ScriptError> {
        let abi = self.artifacts.abi(contract)?;
        let params = abi
            .constructor()
            .map(|constructor| constructor.inputs.clone())
            .unwrap_or_default();
        let tokens = tokenize_inputs(&params, args)?;

        info!("deploying {contract} as {key}");
        let factory = self.artifacts.factory(contract, self.client.clone())?;
        let (instance, receipt) = factory
            .deploy_tokens(tokens)
            .map_err(|e| ScriptError::ContractDeployment(e.to_string()))?
            .confirmations(NUM_DEPLOY_CONFIRMATIONS)
            .send_with_receipt()
            .await
            .map_err(|e| ScriptError::ContractDeployment(e.to_string()))?;
        info!(
            "deployed {} - {} - {:#x}",
            contract, key, receipt.transaction_hash
        );

        self.ledger
            .put(key, &format!("{:#x}", instance.address()), to_provenance(args))?;

        Ok(instance)
    }

    /// Deploy `contract` under its default ledger key
    pub async fn deploy_simple(
        &self,
        contract: &str,
        args: &[String],
    ) -> Result<Contract<M>, ScriptError> {
        self.deploy(contract, &default_save_key(contract), args).await
    }

    /// Bind the interface of `contract` at the address recorded under `key`
    pub fn attach(&self, contract: &str, key: &str) -> Result<Contract<M>, ScriptError> {
        let record = self.require_record(key)?;
        let address = parse_addr(&record.address)?;
        self.artifacts.attach(contract, address, self.client.clone())
    }

    /// Bind the interface of `contract` at the proxy address recorded under
    /// `key`, so that calls route through the proxy
    pub fn attach_by_proxy(&self, contract: &str, key: &str) -> Result<Contract<M>, ScriptError> {
        let record = self.require_record(key)?;
        let proxy = record.proxy.ok_or_else(|| {
            ScriptError::ReadDeployments(format!("no proxy recorded for {key}"))
        })?;
        let address = parse_addr(&proxy.address)?;
        self.artifacts.attach(contract, address, self.client.clone())
    }

    /// The record for `key`, required to exist
    fn require_record(&self, key: &str) -> Result<DeploymentRecord, ScriptError> {
        self.ledger.get(key)?.ok_or_else(|| {
            ScriptError::ReadDeployments(format!("no deployment recorded for {key}"))
        })
    }
}

/// The default ledger key for a contract: its name with the first
/// character lowercased
pub fn default_save_key(contract: &str) -> String {
    let mut chars = contract.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Argument strings as ledger provenance values.
///
/// Arguments that parse as JSON scalars are stored as such, so a numeric
/// constructor argument round-trips as a number; everything else is kept
/// as the literal string.
fn to_provenance(args: &[String]) -> Vec<Value> {
    args.iter()
        .map(|arg| serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.clone())))
        .collect()
}
