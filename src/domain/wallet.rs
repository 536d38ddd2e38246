// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::parsing::strip_0x;
use crate::domain::error::AppError;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use std::fmt;
use std::str::FromStr;

/// Signing identity for one wallet. Lives for the whole process, never persisted.
#[derive(Clone)]
pub struct Wallet {
    index: usize,
    signer: PrivateKeySigner,
}

impl Wallet {
    /// `index` is 1-based, matching the order keys were configured in.
    pub fn from_key(index: usize, raw_key: &str) -> Result<Self, AppError> {
        let key = strip_0x(raw_key.trim());
        let signer = PrivateKeySigner::from_str(key)
            .map_err(|e| AppError::Config(format!("Invalid private key #{index}: {e}")))?;
        Ok(Self { index, signer })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    pub fn short_address(&self) -> String {
        let full = format!("{:#x}", self.address());
        format!("{}...{}", &full[..6], &full[full.len() - 4..])
    }
}

// Keep the key out of logs.
impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("index", &self.index)
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

pub fn wallets_from_keys(keys: &[String]) -> Result<Vec<Wallet>, AppError> {
    keys.iter()
        .enumerate()
        .map(|(i, key)| Wallet::from_key(i + 1, key))
        .collect()
}
