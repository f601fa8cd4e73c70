//! Implementations of the deploy script commands

use std::time::Duration;

use ethers::{providers::Middleware, types::TransactionRequest};
use serde_json::Value;
use tracing::error;

use crate::{
    calldata::encode_call,
    cli::{CallArgs, DeployArgs, DeployProxyArgs, MarkVerifiedArgs, UpgradeArgs},
    confirmation::{confirm_all, watch_tx, PendingItem},
    constants::PROXY_RECORD_KEY,
    deploy::{default_save_key, Deployer},
    errors::ScriptError,
    ledger::ProxyRecord,
    utils::parse_addr,
};

/// Deploy a contract and record the confirmed deployment in the ledger
pub async fn deploy<M: Middleware + 'static>(
    args: DeployArgs,
    deployer: &Deployer<M>,
) -> Result<(), ScriptError> {
    let result = match &args.name {
        Some(name) => deployer.deploy(&args.contract, name, &args.args).await,
        None => deployer.deploy_simple(&args.contract, &args.args).await,
    };

    match result {
        Ok(instance) => {
            println!("{} deployed at {:#x}", args.contract, instance.address());
            Ok(())
        }
        // Tolerance was explicitly requested: report the failure and keep
        // the exit clean
        Err(e) if args.continue_on_error => {
            error!("failed to deploy {}: {e}", args.contract);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Deploy a contract behind a fresh upgradeable proxy and record the proxy
/// metadata under the deployment's ledger key
pub async fn deploy_proxy<M: Middleware + 'static>(
    args: DeployProxyArgs,
    deployer: &Deployer<M>,
) -> Result<(), ScriptError> {
    let key = args
        .name
        .clone()
        .unwrap_or_else(|| default_save_key(&args.contract));

    let implementation = match &args.implementation {
        Some(address) => parse_addr(address)?,
        None => {
            let record = deployer.ledger().get(&key)?.ok_or_else(|| {
                ScriptError::ReadDeployments(format!("no implementation recorded for {key}"))
            })?;
            parse_addr(&record.address)?
        }
    };
    let admin = parse_addr(&args.proxy_admin)?;

    let deployment = deployer
        .deploy_proxy(&args.contract, implementation, admin, &args.init_args)
        .await?;

    // The orchestration performed the on-chain action; remembering it is
    // this layer's job
    deployer.ledger().put_proxy(
        &key,
        &ProxyRecord {
            address: format!("{:#x}", deployment.proxy.address()),
            implementation: format!("{:#x}", deployment.implementation),
            admin: format!("{:#x}", deployment.admin),
            init_calldata: format!("0x{}", hex::encode(&deployment.init_calldata)),
        },
    )?;

    println!(
        "{} proxy deployed at {:#x}",
        args.contract,
        deployment.proxy.address()
    );
    Ok(())
}

/// Upgrade a recorded proxy to a new implementation and update the
/// implementation in its ledger record
pub async fn upgrade<M: Middleware + 'static>(
    args: UpgradeArgs,
    deployer: &Deployer<M>,
) -> Result<(), ScriptError> {
    let key = args
        .name
        .clone()
        .unwrap_or_else(|| default_save_key(&args.contract));
    let implementation = parse_addr(&args.implementation)?;

    let proxy_address = match &args.proxy {
        Some(address) => parse_addr(address)?,
        None => {
            let record = deployer.ledger().get(&key)?.ok_or_else(|| {
                ScriptError::ReadDeployments(format!("no deployment recorded for {key}"))
            })?;
            let proxy = record.proxy.ok_or_else(|| {
                ScriptError::ReadDeployments(format!("no proxy recorded for {key}"))
            })?;
            parse_addr(&proxy.address)?
        }
    };

    let upgrade = deployer
        .upgrade_proxy(
            &args.contract,
            implementation,
            proxy_address,
            Duration::from_millis(args.wait_ms),
        )
        .await?;

    deployer.ledger().put_nested(
        &format!("{key}.{PROXY_RECORD_KEY}.implementation"),
        Value::String(format!("{implementation:#x}")),
    )?;

    println!(
        "{} upgraded to {:#x} behind proxy {:#x}",
        args.contract,
        implementation,
        upgrade.proxy.address()
    );
    Ok(())
}

/// Encode and submit a call to a recorded deployment, waiting for its
/// confirmation
pub async fn call<M: Middleware + 'static>(
    args: CallArgs,
    deployer: &Deployer<M>,
) -> Result<(), ScriptError> {
    let key = args
        .name
        .clone()
        .unwrap_or_else(|| default_save_key(&args.contract));
    let instance = if args.via_proxy {
        deployer.attach_by_proxy(&args.contract, &key)?
    } else {
        deployer.attach(&args.contract, &key)?
    };

    let abi = deployer.artifacts().abi(&args.contract)?;
    let calldata = encode_call(&abi, &args.function, &args.args)?;
    let request = TransactionRequest::new()
        .to(instance.address())
        .data(calldata);

    let client = deployer.client();
    let watcher = deployer.client();
    let item = PendingItem::deferred(move || async move {
        let pending = client
            .send_transaction(request, None /* block */)
            .await
            .map_err(|e| ScriptError::TxSubmission(e.to_string()))?;
        let hash = *pending;
        Ok(watch_tx(watcher, hash))
    });
    confirm_all(vec![item], Duration::from_millis(args.wait_ms)).await?;

    println!("called {}.{} on {}", args.contract, args.function, key);
    Ok(())
}

/// Flag a recorded deployment as source-verified
pub fn mark_verified<M: Middleware + 'static>(
    args: MarkVerifiedArgs,
    deployer: &Deployer<M>,
) -> Result<(), ScriptError> {
    deployer.ledger().mark_verified(&args.name)?;
    println!("{} marked as verified", args.name);
    Ok(())
}

/// Print the deployments recorded for the network
pub fn list<M: Middleware + 'static>(deployer: &Deployer<M>) -> Result<(), ScriptError> {
    for (key, record) in deployer.ledger().entries()? {
        println!("> {key} {}", record.address);
    }
    Ok(())
}
