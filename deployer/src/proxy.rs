//! Deployment and upgrade of proxy-fronted contracts.
//!
//! A contract deployed behind the generic upgradeable proxy keeps one
//! externally visible address for its whole life: deploying constructs the
//! proxy over an implementation with an encoded initializer, upgrading
//! retargets the proxy in place. Neither operation touches the ledger;
//! remembering what happened on-chain is the caller's job, so the
//! orchestration here stays free of storage side effects.

use std::{str::FromStr, time::Duration};

use ethers::{
    abi::Token,
    contract::Contract,
    providers::Middleware,
    types::{Address, Bytes, H256},
};
use tracing::{info, warn};

use crate::{
    calldata::encode_call,
    confirmation::{confirm_all, watch_tx, PendingItem},
    constants::{
        INITIALIZE_FN_NAME, NUM_BYTES_ADDRESS, NUM_BYTES_STORAGE_SLOT, NUM_DEPLOY_CONFIRMATIONS,
        PROXY_ADMIN_STORAGE_SLOT, PROXY_CONTRACT_NAME,
    },
    deploy::Deployer,
    errors::ScriptError,
    solidity::UpgradeableProxyContract,
};

/// The result of deploying a contract behind a fresh proxy
pub struct ProxyDeployment<M> {
    /// The proxy contract itself
    pub proxy: Contract<M>,
    /// The target contract interface, bound at the proxy address so that
    /// calls route through the proxy
    pub instance: Contract<M>,
    /// The implementation the proxy points at
    pub implementation: Address,
    /// The admin authorized to retarget the proxy
    pub admin: Address,
    /// The encoded initializer call passed to the proxy constructor
    pub init_calldata: Bytes,
}

/// The result of retargeting an existing proxy to a new implementation
pub struct ProxyUpgrade<M> {
    /// The proxy contract, at its unchanged address
    pub proxy: UpgradeableProxyContract<M>,
    /// The target contract interface, re-bound at the proxy address
    pub instance: Contract<M>,
    /// The implementation the proxy now points at
    pub implementation: Address,
}

impl<M: Middleware + 'static> Deployer<M> {
    /// Deploy `contract` behind a fresh upgradeable proxy.
    ///
    /// Encodes `initialize(init_args)` against the target ABI and deploys
    /// the proxy constructed with `(implementation, admin, initCalldata)`,
    /// so the implementation is initialized through the proxy's storage in
    /// the same transaction.
    pub async fn deploy_proxy(
        &self,
        contract: &str,
        implementation: Address,
        admin: Address,
        init_args: &[String],
    ) -> Result<ProxyDeployment<M>, ScriptError> {
        let target_abi = self.artifacts().abi(contract)?;
        let init_calldata = encode_call(&target_abi, INITIALIZE_FN_NAME, init_args)?;

        let factory = self.artifacts().factory(PROXY_CONTRACT_NAME, self.client())?;
        let constructor_args = vec![
            Token::Address(implementation),
            Token::Address(admin),
            Token::Bytes(init_calldata.to_vec()),
        ];

        info!("deploying proxy for {contract}");
        let (proxy, receipt) = factory
            .deploy_tokens(constructor_args)
            .map_err(|e| ScriptError::ContractDeployment(e.to_string()))?
            .confirmations(NUM_DEPLOY_CONFIRMATIONS)
            .send_with_receipt()
            .await
            .map_err(|e| ScriptError::ContractDeployment(e.to_string()))?;
        info!(
            "deployed proxy for {} - {:#x} - {:#x}",
            contract,
            proxy.address(),
            receipt.transaction_hash
        );

        self.check_proxy_admin(proxy.address(), admin).await?;

        let instance = Contract::new(proxy.address(), target_abi, self.client());
        Ok(ProxyDeployment {
            proxy,
            instance,
            implementation,
            admin,
            init_calldata,
        })
    }

    /// Retarget the proxy at `proxy_address` to a new implementation,
    /// waiting `delay` after the upgrade confirms.
    ///
    /// The proxy address never changes across upgrades; only the
    /// implementation behind it does.
    pub async fn upgrade_proxy(
        &self,
        contract: &str,
        implementation: Address,
        proxy_address: Address,
        delay: Duration,
    ) -> Result<ProxyUpgrade<M>, ScriptError> {
        let proxy = UpgradeableProxyContract::new(proxy_address, self.client());
        let upgrade_call = proxy.upgrade_to(implementation);
        let watcher = self.client();

        let upgrade_tx = PendingItem::deferred(move || async move {
            let pending = upgrade_call
                .send()
                .await
                .map_err(|e| ScriptError::TxSubmission(e.to_string()))?;
            let hash = *pending;
            Ok(watch_tx(watcher, hash))
        });
        confirm_all(vec![upgrade_tx], delay).await?;
        info!("upgraded proxy {proxy_address:#x} to implementation {implementation:#x}");

        let instance = Contract::new(proxy_address, self.artifacts().abi(contract)?, self.client());
        Ok(ProxyUpgrade {
            proxy,
            instance,
            implementation,
        })
    }

    /// Read the admin recorded in the proxy's EIP1967 admin slot and warn
    /// when it differs from the one the proxy was constructed with
    async fn check_proxy_admin(&self, proxy: Address, expected: Address) -> Result<(), ScriptError> {
        // Can `unwrap` here since we know the storage slot constitutes a valid H256
        let slot = H256::from_str(PROXY_ADMIN_STORAGE_SLOT).unwrap();
        let word = self
            .client()
            .get_storage_at(proxy, slot, None /* block */)
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;

        let stored =
            Address::from_slice(&word[NUM_BYTES_STORAGE_SLOT - NUM_BYTES_ADDRESS..NUM_BYTES_STORAGE_SLOT]);
        if stored != expected {
            warn!("proxy {proxy:#x} reports admin {stored:#x}, expected {expected:#x}");
        }

        Ok(())
    }
}
