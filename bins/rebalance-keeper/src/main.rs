//! Rebalance keeper: drives a rebalancer contract on every new block.
//!
//! Usage: rebalance-keeper --provider <url|path> --provider-type <http|ipc> [--rebalancer-address <addr>]
//!
//! Every flag can also be given through the environment (or a `.env` file), see `--help`.

mod config;

use anyhow::Context;
use clap::Parser;
use clients_rebalancer::{deploy_dev_rebalancer, RpcChainClient, RpcRebalancer};
use keeper::{BlockLoop, EveryNBlocks, Keeper, Shutdown, ShutdownTrigger, TickRangePolicy};
use tracing::{error, info};

use crate::config::{AgentConfig, Cli, RebalancerTarget};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    utils::init_tracing("info");

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!(error = ?e, "keeper failed to start");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AgentConfig::from_cli(cli).context("invalid configuration")?;
    info!(
        mode = %config.mode,
        endpoint = %config.chain.endpoint,
        transport = %config.chain.transport,
        "starting rebalance keeper"
    );

    let chain = RpcChainClient::connect(&config.chain, config.signer)
        .await
        .context("failed to connect to the node")?;

    let rebalancer = match config.target {
        RebalancerTarget::Existing(rebalancer) => rebalancer,
        RebalancerTarget::Deploy(dev) => {
            info!(artifact = %dev.factory_artifact.display(), "deploying development rebalancer");
            deploy_dev_rebalancer(chain.provider(), chain.sender(), &dev)
                .await
                .context("development deployment failed")?
        }
    };
    let contract = RpcRebalancer::new(rebalancer, chain.provider().clone(), chain.sender());
    info!(rebalancer = %contract.address(), sender = %chain.sender(), "rebalancer ready");

    let (trigger, shutdown) = Shutdown::new();
    tokio::spawn(stop_on_signal(trigger));

    let keeper = Keeper::new(
        &config.keeper,
        contract,
        EveryNBlocks::new(config.keeper.summarize_every),
        TickRangePolicy::new(config.keeper.tick_spacing),
        shutdown.clone(),
    );
    BlockLoop::new(chain, keeper, shutdown).run().await;
    Ok(())
}

/// Triggers a graceful stop on Ctrl-C or SIGTERM.
///
/// If no handler can be installed the trigger is dropped and the keeper runs
/// until killed.
async fn stop_on_signal(trigger: ShutdownTrigger) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                return wait_for_ctrl_c(trigger).await;
            }
        };
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("received Ctrl-C"),
                Err(e) => {
                    error!(error = %e, "failed to listen for Ctrl-C");
                    sigterm.recv().await;
                    info!("received SIGTERM");
                }
            },
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
        trigger.trigger();
    }
    #[cfg(not(unix))]
    wait_for_ctrl_c(trigger).await;
}

async fn wait_for_ctrl_c(trigger: ShutdownTrigger) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("received Ctrl-C");
            trigger.trigger();
        }
        Err(e) => error!(error = %e, "failed to listen for Ctrl-C"),
    }
}
