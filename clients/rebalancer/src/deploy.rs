//! Development-mode deployment of a fresh rebalancer.

use alloy::network::TransactionBuilder;
use alloy::primitives::aliases::U24;
use alloy::primitives::{Address, Bytes};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::TransactionRequest;
use serde::Deserialize;
use tracing::info;

use crate::config::{DevDeployConfig, RebalancerConfig};
use crate::contracts::IRebalancerFactory;
use crate::error::ClientError;

/// The part of a Hardhat artifact we need.
#[derive(Debug, Deserialize)]
struct Artifact {
    #[serde(rename = "contractName", default)]
    contract_name: Option<String>,
    bytecode: String,
}

/// Deploys a RebalancerFactory, asks it for a new rebalancer and returns the
/// address carried by the `RebalancerCreated` event.
pub async fn deploy_dev_rebalancer(
    provider: &DynProvider,
    sender: Address,
    config: &DevDeployConfig,
) -> Result<RebalancerConfig, ClientError> {
    let raw = std::fs::read_to_string(&config.factory_artifact).map_err(|e| {
        ClientError::Deploy(format!(
            "cannot read artifact {}: {}",
            config.factory_artifact.display(),
            e
        ))
    })?;
    let bytecode = parse_artifact_bytecode(&raw)?;

    let deploy = TransactionRequest::default()
        .from(sender)
        .with_deploy_code(bytecode);
    let receipt = provider
        .send_transaction(deploy)
        .await
        .map_err(ClientError::from_transport)?
        .get_receipt()
        .await
        .map_err(|e| ClientError::Deploy(e.to_string()))?;
    let factory_address = receipt
        .contract_address
        .ok_or_else(|| ClientError::Deploy("factory deployment produced no contract".into()))?;
    info!(%factory_address, "deployed rebalancer factory");

    let fee = U24::try_from(config.fee)
        .map_err(|e| ClientError::Deploy(format!("fee {} does not fit uint24: {}", config.fee, e)))?;
    let factory = IRebalancerFactory::new(factory_address, provider.clone());
    let receipt = factory
        .createRebalancer(config.token_a, config.token_b, fee)
        .from(sender)
        .send()
        .await
        .map_err(ClientError::from_send)?
        .get_receipt()
        .await
        .map_err(|e| ClientError::Deploy(e.to_string()))?;

    let address = receipt
        .inner
        .logs()
        .iter()
        .find_map(|log| log.log_decode::<IRebalancerFactory::RebalancerCreated>().ok())
        .map(|event| event.inner.data.rebalancer)
        .ok_or_else(|| ClientError::Deploy("no RebalancerCreated event in receipt".into()))?;
    info!(rebalancer = %address, "created development rebalancer");

    Ok(RebalancerConfig { address })
}

fn parse_artifact_bytecode(raw: &str) -> Result<Bytes, ClientError> {
    let artifact: Artifact = serde_json::from_str(raw)
        .map_err(|e| ClientError::Deploy(format!("malformed artifact: {}", e)))?;
    let name = artifact.contract_name.as_deref().unwrap_or("<unnamed>");
    let bytecode: Bytes = artifact
        .bytecode
        .parse()
        .map_err(|e| ClientError::Deploy(format!("bad bytecode in {}: {}", name, e)))?;
    if bytecode.is_empty() {
        return Err(ClientError::Deploy(format!(
            "{} has no bytecode, is it an interface?",
            name
        )));
    }
    Ok(bytecode)
}
