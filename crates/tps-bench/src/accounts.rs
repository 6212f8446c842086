//! Sender and recipient accounts.

use std::{fmt, path::Path};

use alloy_primitives::Address;
use alloy_signer_local::{LocalSignerError, PrivateKeySigner};

use crate::AccountError;

/// A private key and the address derived from it.
#[derive(Clone)]
pub struct Account {
    address: Address,
    signer: PrivateKeySigner,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account").field("address", &self.address).finish_non_exhaustive()
    }
}

impl Account {
    /// Wraps an existing signer.
    pub fn from_signer(signer: PrivateKeySigner) -> Self {
        Self { address: signer.address(), signer }
    }

    /// Returns the account address.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Returns the signer holding the private key.
    pub const fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

/// Fixed pool of accounts loaded once per run.
#[derive(Debug, Clone)]
pub struct AccountPool {
    accounts: Vec<Account>,
}

impl AccountPool {
    /// Creates a pool from already derived accounts.
    pub fn new(accounts: Vec<Account>) -> Result<Self, AccountError> {
        if accounts.is_empty() {
            return Err(AccountError::Empty);
        }
        Ok(Self { accounts })
    }

    /// Parses up to `limit` private keys, one per line.
    ///
    /// Quotes, commas and `0x` prefixes are stripped so JSON-ish key dumps load as is.
    /// Blank lines are skipped.
    pub fn parse(contents: &str, limit: usize) -> Result<Self, AccountError> {
        let mut accounts = Vec::with_capacity(limit.min(1024));

        for (index, line) in contents.lines().enumerate() {
            if accounts.len() >= limit {
                break;
            }

            let cleaned = line.replace(['"', ','], "");
            let cleaned = cleaned.trim();
            let cleaned = cleaned.strip_prefix("0x").unwrap_or(cleaned);
            if cleaned.is_empty() {
                continue;
            }

            let signer: PrivateKeySigner = cleaned.parse().map_err(|e: LocalSignerError| {
                AccountError::InvalidKey { line: index + 1, reason: e.to_string() }
            })?;
            accounts.push(Account::from_signer(signer));
        }

        Self::new(accounts)
    }

    /// Loads up to `limit` private keys from `path`. See [`Self::parse`].
    pub fn load(path: impl AsRef<Path>, limit: usize) -> Result<Self, AccountError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|source| AccountError::Io { path: path.to_path_buf(), source })?;
        Self::parse(&contents, limit)
    }

    /// Returns the number of accounts.
    pub const fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Returns `true` if the pool holds no accounts. Never true for a constructed pool.
    pub const fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Returns the account at `index`, wrapping around the pool.
    pub fn get(&self, index: usize) -> &Account {
        &self.accounts[index % self.accounts.len()]
    }

    /// Returns the recipient for task `id` (one-based): account `id - 1`, wrapping.
    pub fn recipient(&self, id: u64) -> &Account {
        self.get(id.saturating_sub(1) as usize)
    }

    /// Iterates over the accounts in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.iter()
    }
}
