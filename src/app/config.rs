// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::parsing::{enumerated_env, parse_address};
use crate::domain::constants;
use crate::domain::error::AppError;
use crate::domain::wallet::{Wallet, wallets_from_keys};
use crate::network::endpoint::{Endpoint, RotationStrategy, load_candidates};
use crate::services::orchestrator::{RunSettings, TokenSpec, TradePlan};
use crate::services::pipeline::PipelineConfig;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenEntry {
    pub address: String,
    pub decimals: u8,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GlobalSettings {
    // General
    #[serde(default)]
    pub debug: bool,
    pub chain_id: Option<u64>,
    /// `rpc` key of network_config.json.
    pub rpc: Option<String>,
    /// `RPC_URL`; takes precedence over `rpc`.
    pub rpc_url: Option<String>,
    pub explorer_url: Option<String>,

    // Contracts
    #[serde(default)]
    pub tokens: HashMap<String, TokenEntry>,
    pub staking_contract: Option<String>,
    /// Stable-swap entry point; defaults to the stake token contract.
    pub swap_target: Option<String>,
    #[serde(default = "default_swap_token")]
    pub swap_token: String,
    #[serde(default = "default_stake_token")]
    pub stake_token: String,

    // Identity
    #[serde(default)]
    pub private_keys: Vec<String>,

    // Endpoints
    #[serde(default)]
    pub proxies: Vec<String>,
    pub proxies_file: Option<String>,
    #[serde(default = "default_proxy_strategy")]
    pub proxy_strategy: String,
    #[serde(default)]
    pub rank_endpoints_by_latency: bool,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    // Transaction
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default = "default_gas_premium_gwei")]
    pub gas_premium_gwei: u64,
    #[serde(default = "default_true")]
    pub wait_for_receipt: bool,
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,
    #[serde(default = "default_receipt_timeout_ms")]
    pub receipt_timeout_ms: u64,

    // Rounds
    #[serde(default = "default_rounds")]
    pub rounds: u32,
    #[serde(default = "default_tx_pacing_ms")]
    pub tx_pacing_ms: u64,
    #[serde(default = "default_round_pause_ms")]
    pub round_pause_ms: u64,
    #[serde(default = "default_error_cooldown_ms")]
    pub error_cooldown_ms: u64,
    #[serde(default = "default_max_failovers")]
    pub max_failovers: u32,
    #[serde(default = "default_wallet_concurrency")]
    pub wallet_concurrency: usize,
}

// Defaults
fn default_true() -> bool {
    true
}
fn default_swap_token() -> String {
    constants::DEFAULT_SWAP_TOKEN.to_string()
}
fn default_stake_token() -> String {
    constants::DEFAULT_STAKE_TOKEN.to_string()
}
fn default_proxy_strategy() -> String {
    RotationStrategy::default().to_string()
}
fn default_probe_timeout_ms() -> u64 {
    constants::DEFAULT_PROBE_TIMEOUT_MS
}
fn default_request_timeout_ms() -> u64 {
    constants::DEFAULT_REQUEST_TIMEOUT_MS
}
fn default_gas_limit() -> u64 {
    constants::DEFAULT_GAS_LIMIT
}
fn default_gas_premium_gwei() -> u64 {
    constants::DEFAULT_GAS_PREMIUM_GWEI
}
fn default_receipt_poll_ms() -> u64 {
    constants::DEFAULT_RECEIPT_POLL_MS
}
fn default_receipt_timeout_ms() -> u64 {
    constants::DEFAULT_RECEIPT_TIMEOUT_MS
}
fn default_rounds() -> u32 {
    constants::DEFAULT_ROUNDS
}
fn default_tx_pacing_ms() -> u64 {
    constants::DEFAULT_TX_PACING_MS
}
fn default_round_pause_ms() -> u64 {
    constants::DEFAULT_ROUND_PAUSE_MS
}
fn default_error_cooldown_ms() -> u64 {
    constants::DEFAULT_ERROR_COOLDOWN_MS
}
fn default_max_failovers() -> u32 {
    constants::DEFAULT_MAX_FAILOVERS
}
fn default_wallet_concurrency() -> usize {
    1
}

impl GlobalSettings {
    pub fn load_with_path(path: Option<&str>) -> Result<Self, AppError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();
        if let Some(selected_path) = resolve_config_path(path) {
            builder = builder.add_source(File::from(Path::new(&selected_path)).required(true));
        } else {
            builder = builder
                .add_source(File::with_name("network_config").required(false))
                .add_source(File::with_name("config").required(false));
        }
        // Precedence: CLI (in main) > env/.env > file.
        builder = builder.add_source(
            Environment::default()
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("proxies")
                .with_list_parse_key("private_keys"),
        );

        let settings: GlobalSettings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        tracing::debug!(
            target: "config",
            chain_id = ?settings.chain_id,
            rounds = settings.rounds,
            strategy = %settings.proxy_strategy,
            "Settings loaded"
        );
        Ok(settings)
    }

    pub fn load() -> Result<Self, AppError> {
        Self::load_with_path(None)
    }

    /// Everything that must hold before any wallet work starts. Keys are checked
    /// separately by [`GlobalSettings::wallets`].
    pub fn validate(&self) -> Result<(), AppError> {
        self.rpc_url()?;
        self.chain_id()?;
        self.trade_plan()?;
        if self.rounds == 0 {
            tracing::warn!(target: "config", "rounds = 0; wallets will connect and do nothing");
        }
        Ok(())
    }

    pub fn chain_id(&self) -> Result<u64, AppError> {
        self.chain_id
            .ok_or_else(|| AppError::Config("CHAIN_ID is missing".to_string()))
    }

    pub fn rpc_url(&self) -> Result<String, AppError> {
        let raw = [self.rpc_url.as_deref(), self.rpc.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .ok_or_else(|| AppError::Config("RPC_URL is missing".to_string()))?;
        Url::parse(raw).map_err(|e| AppError::Config(format!("Invalid RPC_URL {raw}: {e}")))?;
        Ok(raw.to_string())
    }

    /// Symbol lookup is case-insensitive; config sources may lowercase map keys.
    pub fn token(&self, symbol: &str) -> Result<TokenSpec, AppError> {
        let (_, entry) = self
            .tokens
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(symbol))
            .ok_or_else(|| AppError::Config(format!("Unknown token symbol {symbol}")))?;
        Ok(TokenSpec {
            symbol: symbol.to_ascii_uppercase(),
            address: parse_address(&entry.address, &format!("tokens.{symbol}.address"))?,
            decimals: entry.decimals,
        })
    }

    pub fn trade_plan(&self) -> Result<TradePlan, AppError> {
        let swap_token = self.token(&self.swap_token)?;
        let stake_token = self.token(&self.stake_token)?;
        let staking_raw = self
            .staking_contract
            .as_deref()
            .ok_or_else(|| AppError::Config("STAKING_CONTRACT is missing".to_string()))?;
        let staking_contract = parse_address(staking_raw, "staking_contract")?;
        let swap_target = match self.swap_target.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(raw) => parse_address(raw, "swap_target")?,
            None => stake_token.address,
        };
        Ok(TradePlan {
            swap_token,
            stake_token,
            swap_target,
            staking_contract,
        })
    }

    /// Configured list first, else `PRIVATE_KEY_1..n`.
    pub fn wallet_keys(&self) -> Vec<String> {
        let listed: Vec<String> = self
            .private_keys
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if listed.is_empty() {
            enumerated_env("PRIVATE_KEY")
        } else {
            listed
        }
    }

    pub fn wallets(&self) -> Result<Vec<Wallet>, AppError> {
        let keys = self.wallet_keys();
        if keys.is_empty() {
            return Err(AppError::Config(
                "No wallet keys configured (PRIVATE_KEY_1..n or private_keys)".to_string(),
            ));
        }
        wallets_from_keys(&keys)
    }

    /// Proxy descriptors from `proxies`, else `proxies_file`, else `PROXY_URL_1..n`.
    /// Empty means direct connection only.
    pub fn proxy_candidates(&self) -> Result<Vec<Endpoint>, AppError> {
        if !self.proxies.is_empty() {
            return Ok(load_candidates(&self.proxies.join("\n")));
        }
        if let Some(path) = self.proxies_file.as_deref().filter(|p| !p.trim().is_empty()) {
            let source = fs::read_to_string(path)
                .map_err(|e| AppError::Config(format!("Failed to read proxies file {path}: {e}")))?;
            return Ok(load_candidates(&source));
        }
        Ok(load_candidates(&enumerated_env("PROXY_URL").join("\n")))
    }

    pub fn rotation_strategy(&self) -> RotationStrategy {
        RotationStrategy::parse_or_default(&self.proxy_strategy)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }

    pub fn pipeline_config(&self) -> Result<PipelineConfig, AppError> {
        Ok(PipelineConfig {
            chain_id: self.chain_id()?,
            gas_limit: self.gas_limit,
            gas_premium_gwei: self.gas_premium_gwei,
            pacing: Duration::from_millis(self.tx_pacing_ms),
            wait_for_swap_receipt: self.wait_for_receipt,
            receipt_poll: Duration::from_millis(self.receipt_poll_ms.max(50)),
            receipt_timeout: Duration::from_millis(self.receipt_timeout_ms.max(1_000)),
        })
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            rounds: self.rounds,
            strategy: self.rotation_strategy(),
            round_pause: Duration::from_millis(self.round_pause_ms),
            error_cooldown: Duration::from_millis(self.error_cooldown_ms),
            max_failovers: self.max_failovers,
            wallet_concurrency: self.wallet_concurrency.max(1),
            explorer_url: self
                .explorer_url
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }
}

fn resolve_config_path(path: Option<&str>) -> Option<String> {
    path.map(str::trim)
        .filter(|p| !p.is_empty())
        .map(ToString::to_string)
        .or_else(|| std::env::var("CONFIG_PATH").ok().filter(|p| !p.trim().is_empty()))
}
