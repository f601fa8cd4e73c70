//! Definitions of Solidity functions called during deployment

use ethers::contract::abigen;

abigen!(
    UpgradeableProxyContract,
    r#"[
        function upgradeTo(address newImplementation) external
    ]"#,
);
