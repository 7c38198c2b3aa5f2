use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use std::fmt;

/// One purchasing account for a run.
///
/// Built fresh on every run and never persisted. `referrer` closes the
/// referral ring: account 1 refers to account N, account i to account i-1.
#[derive(Clone)]
pub struct AccountRecord {
    /// 1-based position in the configured account set
    pub index: usize,
    pub address: Address,
    pub signer: PrivateKeySigner,
    pub referrer: Address,
}

impl AccountRecord {
    /// Shortened address used in reports, e.g. `0xf39...b92266`
    pub fn masked_address(&self) -> String {
        mask_address(&self.address)
    }
}

// Keys never reach logs or reports.
impl fmt::Debug for AccountRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountRecord")
            .field("index", &self.index)
            .field("address", &self.address)
            .field("referrer", &self.referrer)
            .finish()
    }
}

pub fn mask_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    let head: String = full.chars().take(5).collect();
    let tail: String = full
        .chars()
        .rev()
        .take(6)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{}...{}", head, tail)
}
