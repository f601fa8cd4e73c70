use clap::Parser;
use deployer::{
    artifacts::ArtifactStore, cli::Cli, deploy::Deployer, errors::ScriptError,
    ledger::DeploymentLedger, utils::setup_client,
};

#[tokio::main]
async fn main() -> Result<(), ScriptError> {
    let Cli {
        priv_key,
        rpc_url,
        network,
        deployments_dir,
        artifacts_dir,
        command,
    } = Cli::parse();

    tracing_subscriber::fmt().pretty().init();

    let client = setup_client(&priv_key, &rpc_url).await?;
    let ledger = DeploymentLedger::open(&deployments_dir, &network)?;
    let artifacts = ArtifactStore::new(artifacts_dir);
    let deployer = Deployer::new(client, artifacts, ledger);

    command.run(deployer).await
}
