//! Definitions of CLI arguments and commands for the deploy scripts

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use ethers::providers::Middleware;

use crate::{
    commands::{call, deploy, deploy_proxy, list, mark_verified, upgrade},
    deploy::Deployer,
    errors::ScriptError,
};

/// Manage contract deployments across networks
#[derive(Parser)]
pub struct Cli {
    /// Private key of the deployer
    // TODO: Better key management
    #[arg(short, long, env = "DEPLOYER_PRIV_KEY")]
    pub priv_key: String,

    /// Network RPC URL
    #[arg(short, long, env = "DEPLOYER_RPC_URL")]
    pub rpc_url: String,

    /// Name of the target network, selecting the ledger file to use
    #[arg(short, long)]
    pub network: String,

    /// Directory holding the per-network deployment ledgers
    #[arg(long, default_value = ".")]
    pub deployments_dir: PathBuf,

    /// Directory holding contract artifacts, one `<Contract>.json` each
    #[arg(long, default_value = "artifacts")]
    pub artifacts_dir: PathBuf,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

/// The deploy script commands
#[derive(Subcommand)]
pub enum Command {
    /// Deploy a contract and record it in the ledger
    Deploy(DeployArgs),
    /// Deploy a contract behind an upgradeable proxy
    DeployProxy(DeployProxyArgs),
    /// Upgrade a proxy to a new implementation
    Upgrade(UpgradeArgs),
    /// Call a method on a recorded deployment
    Call(CallArgs),
    /// Flag a recorded deployment as source-verified
    MarkVerified(MarkVerifiedArgs),
    /// List the deployments recorded for the network
    List,
}

impl Command {
    /// Dispatch the command against the deployer for the target network
    pub async fn run<M: Middleware + 'static>(
        self,
        deployer: Deployer<M>,
    ) -> Result<(), ScriptError> {
        match self {
            Command::Deploy(args) => deploy(args, &deployer).await,
            Command::DeployProxy(args) => deploy_proxy(args, &deployer).await,
            Command::Upgrade(args) => upgrade(args, &deployer).await,
            Command::Call(args) => call(args, &deployer).await,
            Command::MarkVerified(args) => mark_verified(args, &deployer),
            Command::List => list(&deployer),
        }
    }
}

/// Deploy a single contract and record it in the ledger
#[derive(Args)]
pub struct DeployArgs {
    /// The artifact name of the contract to deploy
    pub contract: String,

    /// Constructor arguments, as human-readable strings
    pub args: Vec<String>,

    /// The ledger key to record the deployment under.
    ///
    /// Defaults to the contract name with its first character lowercased.
    #[arg(short, long)]
    pub name: Option<String>,

    /// Report a failed deployment and exit cleanly instead of failing
    #[arg(long)]
    pub continue_on_error: bool,
}

/// Deploy a contract behind a fresh upgradeable proxy.
///
/// The proxy is constructed with `(implementation, admin, initCalldata)`:
/// calls made to the proxy are forwarded to the implementation contract,
/// and only the admin may retarget it later. The proxy's address is the
/// one recorded in the ledger and never changes across upgrades.
#[derive(Args)]
pub struct DeployProxyArgs {
    /// The artifact name of the target contract
    pub contract: String,

    /// Arguments of the target's `initialize` call, as human-readable strings
    pub init_args: Vec<String>,

    /// The ledger key of the deployment.
    ///
    /// Defaults to the contract name with its first character lowercased.
    #[arg(short, long)]
    pub name: Option<String>,

    /// Implementation contract address in hex.
    ///
    /// Defaults to the address recorded under the ledger key.
    #[arg(short, long)]
    pub implementation: Option<String>,

    /// Address of the proxy admin
    #[arg(long, env = "PROXY_ADMIN")]
    pub proxy_admin: String,
}

/// Upgrade a proxy to a new implementation, keeping its address
#[derive(Args)]
pub struct UpgradeArgs {
    /// The artifact name of the target contract
    pub contract: String,

    /// Address of the new implementation contract in hex
    #[arg(short, long)]
    pub implementation: String,

    /// Address of the proxy contract in hex.
    ///
    /// Defaults to the proxy recorded under the ledger key.
    #[arg(long)]
    pub proxy: Option<String>,

    /// The ledger key of the deployment.
    ///
    /// Defaults to the contract name with its first character lowercased.
    #[arg(short, long)]
    pub name: Option<String>,

    /// Milliseconds to wait after the upgrade confirms
    #[arg(long, default_value_t = 0)]
    pub wait_ms: u64,
}

/// Call a method on a recorded deployment
#[derive(Args)]
pub struct CallArgs {
    /// The artifact name of the contract to call
    pub contract: String,

    /// The name of the function to call
    pub function: String,

    /// Function arguments, as human-readable strings
    pub args: Vec<String>,

    /// The ledger key of the deployment.
    ///
    /// Defaults to the contract name with its first character lowercased.
    #[arg(short, long)]
    pub name: Option<String>,

    /// Send the call to the recorded proxy address instead of the
    /// implementation's
    #[arg(long)]
    pub via_proxy: bool,

    /// Milliseconds to wait after the call confirms
    #[arg(long, default_value_t = 0)]
    pub wait_ms: u64,
}

/// Flag a recorded deployment as source-verified
#[derive(Args)]
pub struct MarkVerifiedArgs {
    /// The ledger key of the deployment
    pub name: String,
}
