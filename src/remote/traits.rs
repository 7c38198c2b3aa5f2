use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;

use crate::domain::AccountRecord;
use crate::error::Result;

/// A submitted purchase awaiting confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPurchase {
    pub tx_hash: TxHash,
}

/// A mined, successful purchase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
}

/// Per-account binding to the presale contract.
///
/// Owned by one account task for one attempt and dropped afterwards.
#[async_trait]
pub trait PresaleHandle: Send + Sync {
    /// Whether the sale round is open for purchases
    async fn round_open(&self) -> Result<bool>;

    /// Submit a purchase of `amount` (smallest unit) crediting `referrer`
    async fn purchase(&self, amount: U256, referrer: Address) -> Result<PendingPurchase>;

    /// Wait until the purchase is mined. A reverted transaction is an error.
    async fn confirm(&self, pending: &PendingPurchase) -> Result<PurchaseReceipt>;

    /// Native balance of `address` in the smallest unit
    async fn balance_of(&self, address: Address) -> Result<U256>;
}

/// Builds a fresh handle for an account
#[async_trait]
pub trait RemoteFactory: Send + Sync {
    async fn connect(&self, account: &AccountRecord) -> Result<Box<dyn PresaleHandle>>;
}
