// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::error::AppError;
use crate::network::provider::ChainClient;
use alloy::primitives::Address;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Hands out nonces per sender, reconciled against the node's pending count on every call.
///
/// Each address has its own lock, so sequences for different senders never wait on
/// each other while calls for the same sender are strictly ordered.
#[derive(Clone, Default)]
pub struct NonceSequencer {
    tracked: Arc<DashMap<Address, Arc<Mutex<Option<u64>>>>>,
}

impl NonceSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, address: Address) -> Arc<Mutex<Option<u64>>> {
        self.tracked
            .entry(address)
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Next nonce for `address`: the pending count on first use, afterwards
    /// `max(last + 1, pending)`. A failed chain query is returned as an error, never
    /// papered over with a cached value.
    pub async fn next(&self, client: &dyn ChainClient, address: Address) -> Result<u64, AppError> {
        let slot = self.slot(address);
        let mut guard = slot.lock().await;

        let pending = client.pending_nonce(address).await.map_err(|e| match e {
            AppError::Nonce { .. } => e,
            other => AppError::Nonce {
                address: format!("{address:#x}"),
                reason: other.to_string(),
            },
        })?;

        let next = match *guard {
            None => pending,
            Some(last) => {
                let next = last.saturating_add(1).max(pending);
                if pending > last.saturating_add(1) {
                    tracing::debug!(
                        target: "nonce",
                        address = %address,
                        local = last,
                        pending,
                        "Chain nonce moved ahead of local state"
                    );
                }
                next
            }
        };
        *guard = Some(next);
        Ok(next)
    }

    /// Last nonce handed out for `address`, if any.
    pub async fn last(&self, address: Address) -> Option<u64> {
        let slot = self.tracked.get(&address).map(|s| s.clone())?;
        let guard = slot.lock().await;
        *guard
    }

    pub fn reset(&self) {
        self.tracked.clear();
        tracing::debug!(target: "nonce", "Nonce state cleared");
    }
}
