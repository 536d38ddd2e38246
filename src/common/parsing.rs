// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::error::AppError;
use alloy::primitives::Address;
use std::str::FromStr;

pub fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

pub fn parse_address(raw: &str, field: &str) -> Result<Address, AppError> {
    Address::from_str(raw.trim())
        .map_err(|_| AppError::InvalidAddress(format!("{field}={}", raw.trim())))
}

/// Collect `PREFIX_1`, `PREFIX_2`, ... until the first missing or blank entry.
pub fn enumerated_env(prefix: &str) -> Vec<String> {
    enumerated_values(prefix, |key| std::env::var(key).ok())
}

pub(crate) fn enumerated_values<F>(prefix: &str, mut lookup: F) -> Vec<String>
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = Vec::new();
    for i in 1.. {
        let key = format!("{prefix}_{i}");
        match lookup(&key).map(|v| v.trim().to_string()) {
            Some(v) if !v.is_empty() => out.push(v),
            _ => break,
        }
    }
    out
}
