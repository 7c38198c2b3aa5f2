use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;

use crate::adapters::AlloyPresaleFactory;
use crate::config::AppConfig;
use crate::error::{Result, SnipeError};

use super::RemoteFactory;

/// How often a pending purchase is checked for a receipt
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Create the runtime remote factory from `AppConfig`.
pub fn build_remote_factory(app_config: &AppConfig) -> Result<Arc<dyn RemoteFactory>> {
    let rpc_url = app_config.chain.rpc_url.trim();
    let rpc_url = url::Url::parse(rpc_url)
        .map_err(|e| SnipeError::InvalidConfig(format!("Invalid RPC URL {}: {}", rpc_url, e)))?;

    let contract: Address = app_config
        .chain
        .contract_address
        .trim()
        .parse()
        .map_err(|e| SnipeError::AddressParsing(format!("Invalid presale contract address: {}", e)))?;

    Ok(Arc::new(AlloyPresaleFactory::new(
        rpc_url,
        contract,
        RECEIPT_POLL_INTERVAL,
    )))
}
