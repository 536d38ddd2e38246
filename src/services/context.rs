// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::domain::wallet::Wallet;
use crate::network::endpoint::{ActiveConnection, Endpoint};
use crate::network::nonce::NonceSequencer;
use crate::network::provider::ChainClient;
use alloy::primitives::Address;

/// Everything one wallet worker owns: its key, its nonce state and its live connection.
/// Never shared between workers.
pub struct WalletContext {
    wallet: Wallet,
    nonces: NonceSequencer,
    connection: ActiveConnection,
}

impl WalletContext {
    pub fn new(wallet: Wallet, connection: ActiveConnection) -> Self {
        Self {
            wallet,
            nonces: NonceSequencer::new(),
            connection,
        }
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn sender(&self) -> Address {
        self.wallet.address()
    }

    pub fn nonces(&self) -> &NonceSequencer {
        &self.nonces
    }

    pub fn client(&self) -> &dyn ChainClient {
        self.connection.client().as_ref()
    }

    pub fn connection(&self) -> &ActiveConnection {
        &self.connection
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.connection.endpoint()
    }

    /// Swap in a freshly built connection. Takes `&mut self`, so no call on the old
    /// client can still be running.
    pub fn replace_connection(&mut self, next: ActiveConnection) -> ActiveConnection {
        std::mem::replace(&mut self.connection, next)
    }
}
