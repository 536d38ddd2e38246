// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::error::AppError;
use crate::common::retry::retry_read;
use crate::infrastructure::data::abi::ERC20;
use crate::network::endpoint::Endpoint;
use alloy::network::{Ethereum, ReceiptResponse};
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::transports::TransportError;
use alloy::transports::http::Http;
use alloy_rpc_client::RpcClient;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub type HttpProvider = RootProvider<Ethereum>;

/// Outcome of a mined transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReceiptStatus {
    pub success: bool,
    pub block_number: Option<u64>,
}

/// The node operations the submission core relies on.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn block_number(&self) -> Result<u64, AppError>;
    async fn pending_nonce(&self, address: Address) -> Result<u64, AppError>;
    async fn gas_price(&self) -> Result<u128, AppError>;
    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, AppError>;
    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, AppError>;
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, AppError>;
    async fn receipt_status(&self, hash: B256) -> Result<Option<ReceiptStatus>, AppError>;
}

pub type SharedClient = Arc<dyn ChainClient>;

/// Builds a fresh client bound to one endpoint. Clients are never repointed.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<SharedClient, AppError>;
}

/// JSON-RPC over HTTP, optionally tunnelled through an HTTP(S)/SOCKS proxy.
#[derive(Clone)]
pub struct RpcConnection {
    provider: HttpProvider,
}

impl RpcConnection {
    pub fn new(provider: HttpProvider) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &HttpProvider {
        &self.provider
    }
}

#[async_trait]
impl ChainClient for RpcConnection {
    async fn block_number(&self) -> Result<u64, AppError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| AppError::Connection(format!("eth_blockNumber failed: {e}")))
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64, AppError> {
        let provider = self.provider.clone();
        retry_read(move |_| {
            let provider = provider.clone();
            async move { provider.get_transaction_count(address).pending().await }
        })
        .await
        .map_err(|e| AppError::Nonce {
            address: format!("{address:#x}"),
            reason: e.to_string(),
        })
    }

    async fn gas_price(&self) -> Result<u128, AppError> {
        let provider = self.provider.clone();
        retry_read(move |_| {
            let provider = provider.clone();
            async move { provider.get_gas_price().await }
        })
        .await
        .map_err(|e| AppError::Connection(format!("eth_gasPrice failed: {e}")))
    }

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, AppError> {
        let erc20 = ERC20::new(token, self.provider.clone());
        retry_read(move |_| {
            let c = erc20.clone();
            async move { c.allowance(owner, spender).call().await }
        })
        .await
        .map_err(|e| contract_read_error("allowance", e))
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, AppError> {
        let erc20 = ERC20::new(token, self.provider.clone());
        retry_read(move |_| {
            let c = erc20.clone();
            async move { c.balanceOf(owner).call().await }
        })
        .await
        .map_err(|e| contract_read_error("balance", e))
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, AppError> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| {
                if e.is_transport_error() {
                    AppError::Connection(format!("eth_sendRawTransaction: {e}"))
                } else {
                    AppError::submission("eth_sendRawTransaction", e)
                }
            })?;
        Ok(*pending.tx_hash())
    }

    async fn receipt_status(&self, hash: B256) -> Result<Option<ReceiptStatus>, AppError> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| rpc_read_error("eth_getTransactionReceipt", e))?;
        Ok(receipt.map(|r| ReceiptStatus {
            success: r.status(),
            block_number: r.block_number,
        }))
    }
}

/// An unreachable node is a connectivity failure; anything the node answered is a submission failure.
fn rpc_read_error(stage: &str, e: TransportError) -> AppError {
    if e.is_transport_error() {
        AppError::Connection(format!("{stage}: {e}"))
    } else {
        AppError::submission(stage, e)
    }
}

fn contract_read_error(stage: &str, e: alloy::contract::Error) -> AppError {
    match e {
        alloy::contract::Error::TransportError(e) => rpc_read_error(stage, e),
        other => AppError::submission(stage, other),
    }
}

/// Produces [`RpcConnection`]s for a fixed node URL.
#[derive(Clone, Debug)]
pub struct RpcConnectionFactory {
    rpc_url: Url,
    request_timeout: Duration,
}

impl RpcConnectionFactory {
    pub fn new(rpc_url: &str, request_timeout: Duration) -> Result<Self, AppError> {
        let rpc_url =
            Url::parse(rpc_url).map_err(|e| AppError::Config(format!("Invalid RPC URL: {}", e)))?;
        Ok(Self {
            rpc_url,
            request_timeout,
        })
    }

    pub fn rpc_url(&self) -> &Url {
        &self.rpc_url
    }

    pub fn http(&self, proxy: Option<&str>) -> Result<HttpProvider, AppError> {
        let mut builder = reqwest::Client::builder().timeout(self.request_timeout);
        if let Some(proxy_url) = proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| AppError::Connection(format!("Invalid proxy {proxy_url}: {e}")))?;
            builder = builder.proxy(proxy);
        } else {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| AppError::Connection(format!("HTTP client build failed: {e}")))?;

        let transport = Http::with_client(client, self.rpc_url.clone());
        let rpc = RpcClient::new(transport, false);
        Ok(RootProvider::new(rpc))
    }
}

#[async_trait]
impl ConnectionFactory for RpcConnectionFactory {
    async fn connect(&self, endpoint: &Endpoint) -> Result<SharedClient, AppError> {
        let provider = self.http(endpoint.proxy())?;
        Ok(Arc::new(RpcConnection::new(provider)))
    }
}
