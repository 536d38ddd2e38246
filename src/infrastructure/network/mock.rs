// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

//! In-memory node used by unit tests.

use crate::common::error::AppError;
use crate::domain::constants::APPROVE_SELECTOR;
use crate::infrastructure::data::abi::ERC20;
use crate::network::endpoint::Endpoint;
use crate::network::provider::{ChainClient, ConnectionFactory, ReceiptStatus, SharedClient};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::sol_types::SolCall;
use alloy_consensus::TxEnvelope;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct SentTx {
    pub hash: B256,
    pub from: Address,
    pub chain_id: Option<u64>,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub input: Bytes,
}

impl SentTx {
    pub fn selector(&self) -> [u8; 4] {
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.input[..4]);
        out
    }
}

#[derive(Default)]
struct ChainState {
    pending: HashMap<Address, u64>,
    gas_price: u128,
    allowances: HashMap<(Address, Address, Address), U256>,
    balances: HashMap<(Address, Address), U256>,
    receipts: HashMap<B256, ReceiptStatus>,
    sent: Vec<SentTx>,
    fail_nonce: bool,
    fail_gas: bool,
    fail_send: Option<String>,
    revert_selector: Option<[u8; 4]>,
    nonce_reads: u64,
    allowance_reads: u64,
}

/// Shared-state fake node. Clones observe the same chain.
#[derive(Clone)]
pub struct MockChain {
    state: Arc<Mutex<ChainState>>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    pub fn new() -> Self {
        let state = ChainState {
            gas_price: 1_000_000_000,
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ChainState) -> R) -> R {
        let mut guard = self.state.lock().unwrap();
        f(&mut guard)
    }

    pub fn set_pending(&self, address: Address, nonce: u64) {
        self.with_state(|s| s.pending.insert(address, nonce));
    }

    pub fn set_gas_price(&self, wei: u128) {
        self.with_state(|s| s.gas_price = wei);
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.with_state(|s| s.allowances.insert((token, owner, spender), amount));
    }

    pub fn set_balance(&self, token: Address, owner: Address, amount: U256) {
        self.with_state(|s| s.balances.insert((token, owner), amount));
    }

    pub fn fail_nonce_queries(&self, fail: bool) {
        self.with_state(|s| s.fail_nonce = fail);
    }

    pub fn fail_gas_price(&self, fail: bool) {
        self.with_state(|s| s.fail_gas = fail);
    }

    pub fn reject_sends(&self, reason: Option<&str>) {
        self.with_state(|s| s.fail_send = reason.map(str::to_string));
    }

    pub fn revert_calls_with(&self, selector: Option<[u8; 4]>) {
        self.with_state(|s| s.revert_selector = selector);
    }

    pub fn allowance_of(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.with_state(|s| {
            s.allowances
                .get(&(token, owner, spender))
                .copied()
                .unwrap_or_default()
        })
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.with_state(|s| s.sent.clone())
    }

    pub fn nonce_reads(&self) -> u64 {
        self.with_state(|s| s.nonce_reads)
    }

    pub fn allowance_reads(&self) -> u64 {
        self.with_state(|s| s.allowance_reads)
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn block_number(&self) -> Result<u64, AppError> {
        Ok(1)
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64, AppError> {
        self.with_state(|s| {
            s.nonce_reads += 1;
            if s.fail_nonce {
                return Err(AppError::Nonce {
                    address: format!("{address:#x}"),
                    reason: "mock rpc unavailable".into(),
                });
            }
            Ok(s.pending.get(&address).copied().unwrap_or_default())
        })
    }

    async fn gas_price(&self) -> Result<u128, AppError> {
        self.with_state(|s| {
            if s.fail_gas {
                return Err(AppError::Connection("eth_gasPrice: mock transport closed".into()));
            }
            Ok(s.gas_price)
        })
    }

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, AppError> {
        Ok(self.with_state(|s| {
            s.allowance_reads += 1;
            s.allowances
                .get(&(token, owner, spender))
                .copied()
                .unwrap_or_default()
        }))
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, AppError> {
        Ok(self.with_state(|s| s.balances.get(&(token, owner)).copied().unwrap_or_default()))
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, AppError> {
        let envelope = TxEnvelope::decode_2718(&mut &raw[..])
            .map_err(|e| AppError::submission("decode", e))?;
        let signed = envelope
            .as_legacy()
            .ok_or_else(|| AppError::submission("decode", "expected legacy transaction"))?;
        let from = signed
            .signature()
            .recover_address_from_prehash(&signed.signature_hash())
            .map_err(|e| AppError::submission("recover", e))?;
        let tx = signed.tx();
        let sent = SentTx {
            hash: *signed.hash(),
            from,
            chain_id: tx.chain_id,
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            gas_limit: tx.gas_limit,
            to: tx.to.to().copied().unwrap_or_default(),
            input: tx.input.clone(),
        };
        self.with_state(|s| {
            if let Some(reason) = &s.fail_send {
                return Err(AppError::submission("eth_sendRawTransaction", reason));
            }
            let pending = s.pending.entry(sent.from).or_default();
            *pending = (*pending).max(sent.nonce + 1);

            let reverted = s.revert_selector == Some(sent.selector());
            if !reverted && sent.selector() == APPROVE_SELECTOR {
                let call = ERC20::approveCall::abi_decode(&sent.input)
                    .map_err(|e| AppError::submission("decode", e))?;
                s.allowances.insert((sent.to, sent.from, call.spender), call.amount);
            }
            s.receipts.insert(
                sent.hash,
                ReceiptStatus {
                    success: !reverted,
                    block_number: Some(2),
                },
            );
            s.sent.push(sent.clone());
            Ok(sent.hash)
        })
    }

    async fn receipt_status(&self, hash: B256) -> Result<Option<ReceiptStatus>, AppError> {
        Ok(self.with_state(|s| s.receipts.get(&hash).copied()))
    }
}

/// Hands out clients of one [`MockChain`], with per-endpoint failure modes.
#[derive(Clone)]
pub struct MockFactory {
    chain: MockChain,
    dead: HashSet<String>,
    delays: HashMap<String, Duration>,
    cutoffs: HashMap<String, u64>,
    links: Arc<Mutex<LinkState>>,
}

#[derive(Default)]
struct LinkState {
    connects: HashMap<String, u32>,
    allowance_reads: HashMap<String, u64>,
    severed: HashSet<String>,
}

impl MockFactory {
    pub fn new(chain: MockChain) -> Self {
        Self {
            chain,
            dead: HashSet::new(),
            delays: HashMap::new(),
            cutoffs: HashMap::new(),
            links: Arc::new(Mutex::new(LinkState::default())),
        }
    }

    pub fn with_dead(mut self, label: &str) -> Self {
        self.dead.insert(label.to_string());
        self
    }

    pub fn with_delay(mut self, label: &str, delay: Duration) -> Self {
        self.delays.insert(label.to_string(), delay);
        self
    }

    pub fn with_hanging(self, label: &str) -> Self {
        self.with_delay(label, Duration::from_secs(30))
    }

    /// The endpoint serves `reads` allowance reads, then goes down for good:
    /// every later call through it, and every reconnect, fails with a connection error.
    pub fn with_cutoff_after(mut self, label: &str, reads: u64) -> Self {
        self.cutoffs.insert(label.to_string(), reads);
        self
    }

    pub fn connects_to(&self, label: &str) -> u32 {
        self.links
            .lock()
            .unwrap()
            .connects
            .get(label)
            .copied()
            .unwrap_or_default()
    }

    pub fn is_severed(&self, label: &str) -> bool {
        self.links.lock().unwrap().severed.contains(label)
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    async fn connect(&self, endpoint: &Endpoint) -> Result<SharedClient, AppError> {
        let label = endpoint.label().to_string();
        let severed = {
            let mut links = self.links.lock().unwrap();
            *links.connects.entry(label.clone()).or_default() += 1;
            links.severed.contains(&label)
        };
        if severed || self.dead.contains(&label) {
            return Err(AppError::Connection(format!("{label}: connection refused")));
        }
        if let Some(delay) = self.delays.get(&label) {
            tokio::time::sleep(*delay).await;
        }
        match self.cutoffs.get(&label) {
            Some(&reads) => Ok(Arc::new(MockLink {
                chain: self.chain.clone(),
                label,
                reads,
                links: self.links.clone(),
            })),
            None => Ok(Arc::new(self.chain.clone())),
        }
    }
}

/// A client whose endpoint drops after a fixed number of allowance reads.
struct MockLink {
    chain: MockChain,
    label: String,
    reads: u64,
    links: Arc<Mutex<LinkState>>,
}

impl MockLink {
    fn ensure_up(&self) -> Result<(), AppError> {
        if self.links.lock().unwrap().severed.contains(&self.label) {
            return Err(AppError::Connection(format!("{}: connection reset", self.label)));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainClient for MockLink {
    async fn block_number(&self) -> Result<u64, AppError> {
        self.ensure_up()?;
        self.chain.block_number().await
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64, AppError> {
        self.ensure_up()?;
        self.chain.pending_nonce(address).await
    }

    async fn gas_price(&self) -> Result<u128, AppError> {
        self.ensure_up()?;
        self.chain.gas_price().await
    }

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, AppError> {
        self.ensure_up()?;
        {
            let mut links = self.links.lock().unwrap();
            let served = links.allowance_reads.entry(self.label.clone()).or_default();
            *served += 1;
            if *served > self.reads {
                links.severed.insert(self.label.clone());
                return Err(AppError::Connection(format!(
                    "{}: allowance: connection reset",
                    self.label
                )));
            }
        }
        self.chain.token_allowance(token, owner, spender).await
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, AppError> {
        self.ensure_up()?;
        self.chain.token_balance(token, owner).await
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, AppError> {
        self.ensure_up()?;
        self.chain.send_raw_transaction(raw).await
    }

    async fn receipt_status(&self, hash: B256) -> Result<Option<ReceiptStatus>, AppError> {
        self.ensure_up()?;
        self.chain.receipt_status(hash).await
    }
}
