//! The per-network deployment ledger.
//!
//! One JSON file per network records which contract is deployed where, with
//! which constructor arguments, keyed by the contract's logical name. The
//! ledger is the single durable source of truth between script invocations:
//! every write is flushed to disk before the calling operation proceeds.

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{
    constants::{DEPLOYMENTS_FILE_PREFIX, PROXY_RECORD_KEY, VERIFY_FLAG_KEY},
    errors::ScriptError,
};

/// A single deployment record, keyed by logical contract name
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// The on-chain address of the deployed instance
    #[serde(default)]
    pub address: String,
    /// The constructor arguments used at deploy time, kept for audit only
    #[serde(default)]
    pub arguments: Vec<Value>,
    /// Whether source verification has completed for this instance
    #[serde(default)]
    pub verify: bool,
    /// Proxy metadata, present when the instance sits behind an upgradeable proxy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyRecord>,
}

/// Proxy metadata nested under a deployment record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRecord {
    /// The proxy contract address, stable across upgrades
    pub address: String,
    /// The implementation the proxy currently points at
    pub implementation: String,
    /// The admin authorized to retarget the proxy
    pub admin: String,
    /// The encoded initializer call passed to the proxy constructor
    pub init_calldata: String,
}

/// The deployment ledger of a single network.
///
/// Reads and writes go through the whole file on every operation; the
/// ledger assumes a single writer process.
pub struct DeploymentLedger {
    /// Path of the backing ledger file
    path: PathBuf,
}

impl DeploymentLedger {
    /// Open the ledger for `network` under `dir`.
    ///
    /// A missing file is an empty ledger; an unparseable file is an error
    /// here rather than at first use.
    pub fn open(dir: impl AsRef<Path>, network: &str) -> Result<Self, ScriptError> {
        let path = dir
            .as_ref()
            .join(format!("{DEPLOYMENTS_FILE_PREFIX}{network}.json"));
        let ledger = Self { path };
        ledger.read_all()?;
        Ok(ledger)
    }

    /// Create or overwrite the record for `key`.
    ///
    /// The whole record is replaced; a previous verification flag or proxy
    /// sub-record does not survive an overwrite.
    pub fn put(&self, key: &str, address: &str, arguments: Vec<Value>) -> Result<(), ScriptError> {
        let mut records = self.read_all()?;
        let record = DeploymentRecord {
            address: address.to_string(),
            arguments,
            verify: false,
            proxy: None,
        };
        let value = serde_json::to_value(&record)
            .map_err(|e| ScriptError::WriteDeployments(e.to_string()))?;
        records.insert(key.to_string(), value);
        self.write_all(&records)
    }

    /// Look up the record for `key`, returning `None` when nothing is recorded
    pub fn get(&self, key: &str) -> Result<Option<DeploymentRecord>, ScriptError> {
        let records = self.read_all()?;
        match records.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| ScriptError::ReadDeployments(e.to_string())),
        }
    }

    /// Write `value` at a dotted `path` such as `Vault.verify` or
    /// `Vault.proxy.implementation`, leaving sibling fields untouched.
    ///
    /// Missing intermediate objects are created.
    pub fn put_nested(&self, path: &str, value: Value) -> Result<(), ScriptError> {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(ScriptError::WriteDeployments(format!(
                "invalid ledger path: {path}"
            )));
        }

        let mut records = self.read_all()?;
        insert_at(&mut records, &segments, value);
        self.write_all(&records)
    }

    /// Record the proxy metadata for `key` without disturbing the rest of the record
    pub fn put_proxy(&self, key: &str, proxy: &ProxyRecord) -> Result<(), ScriptError> {
        let value = serde_json::to_value(proxy)
            .map_err(|e| ScriptError::WriteDeployments(e.to_string()))?;
        self.put_nested(&format!("{key}.{PROXY_RECORD_KEY}"), value)
    }

    /// Flag the record for `key` as source-verified. Idempotent.
    pub fn mark_verified(&self, key: &str) -> Result<(), ScriptError> {
        self.put_nested(&format!("{key}.{VERIFY_FLAG_KEY}"), Value::Bool(true))
    }

    /// All records in the ledger, as `(key, record)` pairs
    pub fn entries(&self) -> Result<Vec<(String, DeploymentRecord)>, ScriptError> {
        self.read_all()?
            .into_iter()
            .map(|(key, value)| {
                serde_json::from_value(value)
                    .map(|record| (key, record))
                    .map_err(|e| ScriptError::ReadDeployments(e.to_string()))
            })
            .collect()
    }

    /// Read the whole ledger file into a JSON map
    fn read_all(&self) -> Result<Map<String, Value>, ScriptError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let contents = fs::read_to_string(&self.path)
            .map_err(|e| ScriptError::ReadDeployments(e.to_string()))?;
        let parsed: Value = serde_json::from_str(&contents)
            .map_err(|e| ScriptError::ReadDeployments(e.to_string()))?;

        match parsed {
            Value::Object(map) => Ok(map),
            _ => Err(ScriptError::ReadDeployments(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
        }
    }

    /// Write the whole ledger file, fsyncing before returning so that a
    /// recorded deployment survives the process
    fn write_all(&self, records: &Map<String, Value>) -> Result<(), ScriptError> {
        let contents = serde_json::to_string_pretty(records)
            .map_err(|e| ScriptError::WriteDeployments(e.to_string()))?;

        let mut file =
            File::create(&self.path).map_err(|e| ScriptError::WriteDeployments(e.to_string()))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| ScriptError::WriteDeployments(e.to_string()))?;
        file.sync_all()
            .map_err(|e| ScriptError::WriteDeployments(e.to_string()))
    }
}

/// Insert `value` at the nested `segments` path under `map`, creating or
/// overwriting intermediate objects as needed
fn insert_at(map: &mut Map<String, Value>, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [last] => {
            map.insert((*last).to_string(), value);
        }
        [head, rest @ ..] => {
            let child = map
                .entry((*head).to_string())
                .or_insert_with(|| json!({}));
            if !child.is_object() {
                *child = json!({});
            }
            if let Value::Object(child_map) = child {
                insert_at(child_map, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::{tempdir, TempDir};

    use super::{DeploymentLedger, ProxyRecord};

    const VAULT_ADDR: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

    fn testnet_ledger() -> (TempDir, DeploymentLedger) {
        let dir = tempdir().unwrap();
        let ledger = DeploymentLedger::open(dir.path(), "testnet").unwrap();
        (dir, ledger)
    }

    #[test]
    fn test_round_trip() {
        let (_dir, ledger) = testnet_ledger();
        ledger.put("Vault", VAULT_ADDR, vec![json!(1000)]).unwrap();

        let record = ledger.get("Vault").unwrap().unwrap();
        assert_eq!(record.address, VAULT_ADDR);
        assert_eq!(record.arguments, vec![json!(1000)]);
        assert!(!record.verify);
        assert!(record.proxy.is_none());
    }

    #[test]
    fn test_missing_key() {
        let (_dir, ledger) = testnet_ledger();
        assert!(ledger.get("Vault").unwrap().is_none());
    }

    #[test]
    fn test_overwrite_replaces_record() {
        let (_dir, ledger) = testnet_ledger();
        ledger.put("Vault", VAULT_ADDR, vec![json!(1000)]).unwrap();
        ledger.mark_verified("Vault").unwrap();

        let other_addr = "0x0000000000000000000000000000000000000042";
        ledger.put("Vault", other_addr, vec![json!(2000)]).unwrap();

        let record = ledger.get("Vault").unwrap().unwrap();
        assert_eq!(record.address, other_addr);
        assert_eq!(record.arguments, vec![json!(2000)]);
        // The flag belonged to the replaced record
        assert!(!record.verify);
    }

    #[test]
    fn test_nested_write_isolation() {
        let (_dir, ledger) = testnet_ledger();
        ledger.put("Vault", VAULT_ADDR, vec![json!(1000)]).unwrap();
        ledger.put_nested("Vault.verify", json!(true)).unwrap();

        let record = ledger.get("Vault").unwrap().unwrap();
        assert_eq!(record.address, VAULT_ADDR);
        assert_eq!(record.arguments, vec![json!(1000)]);
        assert!(record.verify);
    }

    #[test]
    fn test_mark_verified_idempotent() {
        let (_dir, ledger) = testnet_ledger();
        ledger.put("Vault", VAULT_ADDR, vec![]).unwrap();
        ledger.mark_verified("Vault").unwrap();
        ledger.mark_verified("Vault").unwrap();

        assert!(ledger.get("Vault").unwrap().unwrap().verify);
    }

    #[test]
    fn test_put_proxy_preserves_siblings() {
        let (_dir, ledger) = testnet_ledger();
        ledger.put("Vault", VAULT_ADDR, vec![json!(1000)]).unwrap();

        let proxy = ProxyRecord {
            address: "0x0000000000000000000000000000000000000010".to_string(),
            implementation: VAULT_ADDR.to_string(),
            admin: "0x0000000000000000000000000000000000000020".to_string(),
            init_calldata: "0x8129fc1c".to_string(),
        };
        ledger.put_proxy("Vault", &proxy).unwrap();

        let record = ledger.get("Vault").unwrap().unwrap();
        assert_eq!(record.address, VAULT_ADDR);
        assert_eq!(record.arguments, vec![json!(1000)]);
        assert_eq!(record.proxy.unwrap(), proxy);
    }

    #[test]
    fn test_deep_nested_write() {
        let (_dir, ledger) = testnet_ledger();
        ledger.put("Vault", VAULT_ADDR, vec![]).unwrap();

        let proxy = ProxyRecord {
            address: "0x0000000000000000000000000000000000000010".to_string(),
            implementation: VAULT_ADDR.to_string(),
            admin: "0x0000000000000000000000000000000000000020".to_string(),
            init_calldata: "0x8129fc1c".to_string(),
        };
        ledger.put_proxy("Vault", &proxy).unwrap();

        let new_impl = "0x0000000000000000000000000000000000000099";
        ledger
            .put_nested("Vault.proxy.implementation", json!(new_impl))
            .unwrap();

        let record = ledger.get("Vault").unwrap().unwrap();
        let recorded_proxy = record.proxy.unwrap();
        assert_eq!(recorded_proxy.implementation, new_impl);
        // Sibling proxy fields are untouched
        assert_eq!(recorded_proxy.address, proxy.address);
        assert_eq!(recorded_proxy.admin, proxy.admin);
    }

    #[test]
    fn test_invalid_path_rejected() {
        let (_dir, ledger) = testnet_ledger();
        assert!(ledger.put_nested("Vault..verify", json!(true)).is_err());
    }

    #[test]
    fn test_corrupt_file_fails_at_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deployed-testnet.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(DeploymentLedger::open(dir.path(), "testnet").is_err());
    }

    #[test]
    fn test_networks_are_separate() {
        let dir = tempdir().unwrap();
        let testnet = DeploymentLedger::open(dir.path(), "testnet").unwrap();
        let mainnet = DeploymentLedger::open(dir.path(), "mainnet").unwrap();

        testnet.put("Vault", VAULT_ADDR, vec![]).unwrap();
        assert!(mainnet.get("Vault").unwrap().is_none());
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let ledger = DeploymentLedger::open(dir.path(), "testnet").unwrap();
            ledger.put("Vault", VAULT_ADDR, vec![json!(1000)]).unwrap();
        }

        let reopened = DeploymentLedger::open(dir.path(), "testnet").unwrap();
        assert_eq!(reopened.get("Vault").unwrap().unwrap().address, VAULT_ADDR);
    }

    #[test]
    fn test_entries() {
        let (_dir, ledger) = testnet_ledger();
        ledger.put("Vault", VAULT_ADDR, vec![]).unwrap();
        ledger
            .put("Token", "0x0000000000000000000000000000000000000042", vec![])
            .unwrap();

        let entries = ledger.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|(key, _)| key == "Vault"));
        assert!(entries.iter().any(|(key, _)| key == "Token"));
    }
}
