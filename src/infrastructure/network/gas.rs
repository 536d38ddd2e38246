// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::domain::constants::GWEI;
use crate::network::provider::ChainClient;

/// How a legacy gas price is derived from the node's `eth_gasPrice`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GasPolicy {
    /// Network price plus a flat premium in wei.
    Premium(u128),
    /// Network price times two.
    Doubled,
}

impl GasPolicy {
    pub fn premium_gwei(gwei: u64) -> Self {
        GasPolicy::Premium(u128::from(gwei).saturating_mul(GWEI))
    }

    pub fn apply(&self, network_price: u128) -> u128 {
        match self {
            GasPolicy::Premium(premium) => network_price.saturating_add(*premium),
            GasPolicy::Doubled => network_price.saturating_mul(2),
        }
    }
}

/// Price for the next submission, derived from the node's current `eth_gasPrice`.
/// A failed query is returned as is; a stale price is never reused.
pub async fn quote_gas_price(client: &dyn ChainClient, policy: GasPolicy) -> Result<u128, AppError> {
    let network = client.gas_price().await?;
    Ok(policy.apply(network))
}
