use crate::domain::AccountRecord;
use crate::error::{Result, SnipeError};
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use std::collections::HashMap;
use tracing::{info, warn};
use zeroize::Zeroize;

/// Where per-account credentials come from.
///
/// Account `i` (1-based) is described by `ADR_<i>` (its address) and
/// `PVK_<i>` (its private key).
pub trait CredentialSource: Send + Sync {
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Reads credentials from the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl CredentialSource for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.trim().is_empty()).cloned()
    }
}

pub fn address_var(index: usize) -> String {
    format!("ADR_{}", index)
}

pub fn key_var(index: usize) -> String {
    format!("PVK_{}", index)
}

/// Build the account set for one run.
///
/// Every account needs both its address and its key; a single missing or
/// malformed credential fails the whole build. Referrers form a closed ring
/// over the configured addresses.
pub fn build_accounts(n: usize, source: &dyn CredentialSource) -> Result<Vec<AccountRecord>> {
    if n == 0 {
        return Err(SnipeError::InvalidConfig(
            "account count must be at least 1".to_string(),
        ));
    }

    let mut loaded = Vec::with_capacity(n);
    for index in 1..=n {
        let address = load_address(index, source)?;
        let signer = load_signer(index, source)?;

        if signer.address() != address {
            warn!(
                account = index,
                "{} does not match the address derived from {} ({})",
                address_var(index),
                key_var(index),
                signer.address()
            );
        }

        loaded.push((index, address, signer));
    }

    let addresses: Vec<Address> = loaded.iter().map(|(_, address, _)| *address).collect();
    let accounts: Vec<AccountRecord> = loaded
        .into_iter()
        .map(|(index, address, signer)| {
            // index is 1-based: previous account sits at index - 2, wrapping to the last
            let referrer = addresses[(index + n - 2) % n];
            AccountRecord {
                index,
                address,
                signer,
                referrer,
            }
        })
        .collect();

    info!("Loaded {} accounts (referral ring closed)", accounts.len());
    Ok(accounts)
}

fn load_address(index: usize, source: &dyn CredentialSource) -> Result<Address> {
    let var = address_var(index);
    let raw = source
        .lookup(&var)
        .ok_or_else(|| SnipeError::MissingCredential {
            index,
            var: var.clone(),
        })?;

    raw.trim()
        .parse::<Address>()
        .map_err(|e| SnipeError::InvalidCredential {
            index,
            reason: format!("{} is not an address: {}", var, e),
        })
}

fn load_signer(index: usize, source: &dyn CredentialSource) -> Result<PrivateKeySigner> {
    let var = key_var(index);
    let mut raw = source
        .lookup(&var)
        .ok_or_else(|| SnipeError::MissingCredential {
            index,
            var: var.clone(),
        })?;

    let parsed = raw
        .trim()
        .trim_start_matches("0x")
        .parse::<PrivateKeySigner>()
        .map_err(|e| SnipeError::InvalidCredential {
            index,
            reason: format!("{} is not a valid private key: {}", var, e),
        });

    raw.zeroize();

    parsed
}
