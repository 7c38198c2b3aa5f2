//! Presale contract client over JSON-RPC
//!
//! Each account gets its own signing provider; nothing is shared between
//! accounts or reused across attempts.

use alloy::network::{EthereumWallet, ReceiptResponse};
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::sol;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use crate::domain::AccountRecord;
use crate::error::{Result, SnipeError};
use crate::remote::{PendingPurchase, PresaleHandle, PurchaseReceipt, RemoteFactory};

// Generate contract bindings for the presale round
sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IPresale {
        /// True once round 2 is open for purchases
        function start() external view returns (bool);

        /// Buy `amount` of the sale's base asset, crediting `referrer`
        function buyPresale2(uint256 amount, address referrer) external;
    }
}

/// Builds signing providers bound to the presale contract
#[derive(Debug, Clone)]
pub struct AlloyPresaleFactory {
    rpc_url: url::Url,
    contract: Address,
    receipt_poll: Duration,
}

impl AlloyPresaleFactory {
    pub fn new(rpc_url: url::Url, contract: Address, receipt_poll: Duration) -> Self {
        Self {
            rpc_url,
            contract,
            receipt_poll,
        }
    }
}

#[async_trait]
impl RemoteFactory for AlloyPresaleFactory {
    async fn connect(&self, account: &AccountRecord) -> Result<Box<dyn PresaleHandle>> {
        let wallet = EthereumWallet::from(account.signer.clone());
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(self.rpc_url.clone())
            .erased();

        // Probe the endpoint before handing the handle out
        let balance = provider
            .get_balance(account.address)
            .await
            .map_err(|e| SnipeError::Rpc(format!("Connection check failed: {}", e)))?;
        debug!(account = account.index, "Connected, balance {} wei", balance);

        Ok(Box::new(AlloyPresaleHandle {
            contract: IPresale::new(self.contract, provider.clone()),
            provider,
            receipt_poll: self.receipt_poll,
        }))
    }
}

/// One account's view of the presale contract
pub struct AlloyPresaleHandle {
    provider: DynProvider,
    contract: IPresale::IPresaleInstance<DynProvider>,
    receipt_poll: Duration,
}

#[async_trait]
impl PresaleHandle for AlloyPresaleHandle {
    async fn round_open(&self) -> Result<bool> {
        self.contract
            .start()
            .call()
            .await
            .map_err(|e| SnipeError::Rpc(format!("start() failed: {}", e)))
    }

    async fn purchase(&self, amount: U256, referrer: Address) -> Result<PendingPurchase> {
        let pending = self
            .contract
            .buyPresale2(amount, referrer)
            .send()
            .await
            .map_err(|e| SnipeError::Submission(format!("buyPresale2 failed: {}", e)))?;

        let tx_hash = *pending.tx_hash();
        info!("Purchase submitted: {:?}", tx_hash);
        Ok(PendingPurchase { tx_hash })
    }

    async fn confirm(&self, pending: &PendingPurchase) -> Result<PurchaseReceipt> {
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(pending.tx_hash)
                .await
                .map_err(|e| SnipeError::Confirmation(format!("Receipt lookup failed: {}", e)))?;

            match receipt {
                Some(receipt) if receipt.status() => {
                    return Ok(PurchaseReceipt {
                        tx_hash: pending.tx_hash,
                        block_number: receipt.block_number(),
                    });
                }
                Some(_) => {
                    return Err(SnipeError::Confirmation(format!(
                        "Transaction {:?} reverted",
                        pending.tx_hash
                    )));
                }
                None => tokio::time::sleep(self.receipt_poll).await,
            }
        }
    }

    async fn balance_of(&self, address: Address) -> Result<U256> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|e| SnipeError::Rpc(format!("Balance lookup failed: {}", e)))
    }
}
