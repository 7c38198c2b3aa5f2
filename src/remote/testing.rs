//! Scripted in-process remote for tests

use alloy::primitives::{Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{PendingPurchase, PresaleHandle, PurchaseReceipt, RemoteFactory};
use crate::domain::AccountRecord;
use crate::error::{Result, SnipeError};

/// Chain state shared by every handle the factory hands out
#[derive(Default)]
pub struct FakeChain {
    /// Gate opens on this round_open call (1-based); None keeps it closed
    pub gate_opens_on: Option<usize>,
    pub failing_connects: usize,
    pub failing_gate_queries: usize,
    pub failing_purchases: usize,
    pub hanging_confirms: usize,
    pub connects: AtomicUsize,
    pub gate_queries: AtomicUsize,
    pub purchases: AtomicUsize,
    pub confirms: AtomicUsize,
}

impl FakeChain {
    pub fn open() -> Self {
        Self {
            gate_opens_on: Some(1),
            ..Default::default()
        }
    }

    pub fn purchases(&self) -> usize {
        self.purchases.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn gate_queries(&self) -> usize {
        self.gate_queries.load(Ordering::SeqCst)
    }

    pub fn confirms(&self) -> usize {
        self.confirms.load(Ordering::SeqCst)
    }
}

pub struct FakeFactory(pub Arc<FakeChain>);

struct FakeHandle(Arc<FakeChain>);

#[async_trait]
impl RemoteFactory for FakeFactory {
    async fn connect(&self, _account: &AccountRecord) -> Result<Box<dyn PresaleHandle>> {
        let n = self.0.connects.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.0.failing_connects {
            return Err(SnipeError::Rpc("connection refused".into()));
        }
        Ok(Box::new(FakeHandle(self.0.clone())))
    }
}

#[async_trait]
impl PresaleHandle for FakeHandle {
    async fn round_open(&self) -> Result<bool> {
        let n = self.0.gate_queries.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.0.failing_gate_queries {
            return Err(SnipeError::Rpc("start() failed: header not found".into()));
        }
        Ok(self.0.gate_opens_on.map(|open_at| n >= open_at).unwrap_or(false))
    }

    async fn purchase(&self, _amount: U256, _referrer: Address) -> Result<PendingPurchase> {
        let n = self.0.purchases.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.0.failing_purchases {
            return Err(SnipeError::Submission("execution reverted".into()));
        }
        Ok(PendingPurchase {
            tx_hash: B256::with_last_byte(n as u8),
        })
    }

    async fn confirm(&self, pending: &PendingPurchase) -> Result<PurchaseReceipt> {
        let n = self.0.confirms.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.0.hanging_confirms {
            std::future::pending::<()>().await;
        }
        Ok(PurchaseReceipt {
            tx_hash: pending.tx_hash,
            block_number: Some(30_000_000),
        })
    }

    async fn balance_of(&self, _address: Address) -> Result<U256> {
        // 0.25 BNB
        Ok(U256::from(250_000_000_000_000_000u64))
    }
}

/// Deterministic signer for test account `index` (1-based)
pub fn test_signer(index: usize) -> PrivateKeySigner {
    PrivateKeySigner::from_bytes(&B256::with_last_byte(index as u8)).expect("valid test key")
}

/// `n` accounts wired into a referral ring
pub fn test_accounts(n: usize) -> Vec<AccountRecord> {
    let signers: Vec<PrivateKeySigner> = (1..=n).map(test_signer).collect();
    signers
        .iter()
        .enumerate()
        .map(|(i, signer)| AccountRecord {
            index: i + 1,
            address: signer.address(),
            signer: signer.clone(),
            referrer: signers[(i + n - 1) % n].address(),
        })
        .collect()
}
