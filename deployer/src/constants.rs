//! Constants used in the deploy scripts

/// The prefix of the per-network ledger file name.
///
/// The ledger for network `goerli` lives in `deployed-goerli.json`.
pub const DEPLOYMENTS_FILE_PREFIX: &str = "deployed-";

/// The artifact name of the generic upgradeable proxy contract.
///
/// The proxy is constructed with `(implementation, admin, initCalldata)`
/// and forwards all other calls to its implementation.
pub const PROXY_CONTRACT_NAME: &str = "UpgradeableProxy";

/// The name of the initializer method encoded into the proxy constructor
pub const INITIALIZE_FN_NAME: &str = "initialize";

/// The ledger record key under which a deployment's proxy metadata is nested
pub const PROXY_RECORD_KEY: &str = "proxy";

/// The ledger record key of the verification flag
pub const VERIFY_FLAG_KEY: &str = "verify";

/// The number of confirmations to wait for a contract deployment transaction
pub const NUM_DEPLOY_CONFIRMATIONS: usize = 1;

/// The interval in milliseconds between receipt polls for a submitted transaction
pub const RECEIPT_POLL_INTERVAL_MS: u64 = 1000;

/// The storage slot containing the admin address in the upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#admin-address
pub const PROXY_ADMIN_STORAGE_SLOT: &str =
    "0xb53127684a568b3173ae13b9f8a6016e243e63b6e8ee1178d6a717850b5d6103";

/// The number of bytes stored in a single storage slot
pub const NUM_BYTES_STORAGE_SLOT: usize = 32;

/// The number of bytes in an Ethereum address
pub const NUM_BYTES_ADDRESS: usize = 20;
