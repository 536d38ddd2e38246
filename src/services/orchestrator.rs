// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::error::{AppError, FailureKind};
use crate::domain::constants::{MAX_ROUND_AMOUNT_CENTS, MIN_ROUND_AMOUNT_CENTS};
use crate::domain::wallet::Wallet;
use crate::network::endpoint::{EndpointPool, RotationStrategy};
use crate::services::context::WalletContext;
use crate::services::pipeline::{ApprovalOutcome, TransactionPipeline};
use crate::services::stats::RunStats;
use alloy::primitives::{Address, B256, U256};
use futures::stream::{self, StreamExt};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenSpec {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
}

/// Which contracts a round touches.
#[derive(Clone, Debug)]
pub struct TradePlan {
    pub swap_token: TokenSpec,
    pub stake_token: TokenSpec,
    /// Stable-swap entry point; also the spender of the swap-token approval.
    pub swap_target: Address,
    pub staking_contract: Address,
}

#[derive(Clone, Debug)]
pub struct RunSettings {
    pub rounds: u32,
    pub strategy: RotationStrategy,
    pub round_pause: Duration,
    pub error_cooldown: Duration,
    pub max_failovers: u32,
    pub wallet_concurrency: usize,
    pub explorer_url: Option<String>,
}

/// Parameters of one wallet-round iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundContext {
    pub wallet_index: usize,
    pub round: u32,
    /// Human amount in hundredths of a token.
    pub amount_cents: u64,
}

impl RoundContext {
    pub fn generate(wallet_index: usize, round: u32) -> Self {
        Self {
            wallet_index,
            round,
            amount_cents: random_amount_cents(),
        }
    }

    pub fn human_amount(&self) -> String {
        format!("{}.{:02}", self.amount_cents / 100, self.amount_cents % 100)
    }

    pub fn amount_for(&self, decimals: u8) -> U256 {
        scale_amount(self.amount_cents, decimals)
    }
}

/// Uniform draw in [0.10, 1.00], rounded to two decimals.
pub fn random_amount_cents() -> u64 {
    let mut rng = rand::thread_rng();
    let min = MIN_ROUND_AMOUNT_CENTS as f64 / 100.0;
    let max = MAX_ROUND_AMOUNT_CENTS as f64 / 100.0;
    let human: f64 = rng.gen_range(min..=max);
    ((human * 100.0).round() as u64).clamp(MIN_ROUND_AMOUNT_CENTS, MAX_ROUND_AMOUNT_CENTS)
}

/// `cents / 100` tokens expressed in base units of a token with `decimals`.
pub fn scale_amount(cents: u64, decimals: u8) -> U256 {
    let unit = U256::from(10u64).pow(U256::from(decimals));
    U256::from(cents) * unit / U256::from(100u64)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundReport {
    pub round: u32,
    pub amount_cents: u64,
    pub approval: ApprovalOutcome,
    pub swap_hash: B256,
    /// `None` when there was no stake token balance.
    pub stake_hash: Option<B256>,
}

#[derive(Clone, Debug, Default)]
pub struct WalletReport {
    pub wallet_index: usize,
    pub address: Address,
    pub endpoint: Option<String>,
    pub rounds: Vec<RoundReport>,
    pub failed_rounds: u32,
    pub failovers: u32,
    /// No endpoint could be reached at start.
    pub skipped: bool,
    /// Reason the wallet stopped before the round bound.
    pub stopped: Option<String>,
}

pub struct RoundOrchestrator {
    pool: Arc<EndpointPool>,
    pipeline: Arc<TransactionPipeline>,
    plan: TradePlan,
    settings: RunSettings,
    stats: Arc<RunStats>,
}

impl RoundOrchestrator {
    pub fn new(
        pool: Arc<EndpointPool>,
        pipeline: Arc<TransactionPipeline>,
        plan: TradePlan,
        settings: RunSettings,
    ) -> Self {
        Self {
            pool,
            pipeline,
            plan,
            settings,
            stats: Arc::new(RunStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<RunStats> {
        self.stats.clone()
    }

    pub fn pool(&self) -> &EndpointPool {
        &self.pool
    }

    /// Process every wallet, at most `wallet_concurrency` at a time. Reports come
    /// back in wallet order.
    pub async fn run(&self, wallets: Vec<Wallet>) -> Vec<WalletReport> {
        let concurrency = self.settings.wallet_concurrency.max(1);
        tracing::info!(
            target: "round",
            wallets = wallets.len(),
            rounds = self.settings.rounds,
            strategy = %self.settings.strategy,
            endpoints = self.pool.len(),
            concurrency,
            "Starting run"
        );
        let reports: Vec<WalletReport> = stream::iter(wallets)
            .map(|wallet| self.process_wallet(wallet))
            .buffered(concurrency)
            .collect()
            .await;
        self.stats
            .log_summary(self.pool.probe_count(), self.pool.probe_failures());
        reports
    }

    pub async fn process_wallet(&self, wallet: Wallet) -> WalletReport {
        let mut report = WalletReport {
            wallet_index: wallet.index(),
            address: wallet.address(),
            ..Default::default()
        };
        let start = self
            .settings
            .strategy
            .desired_index(wallet.index(), 1, self.pool.len())
            .unwrap_or(0);

        let Some(connection) = self.pool.get_working_connection(start).await else {
            tracing::warn!(
                target: "round",
                wallet = wallet.index(),
                address = %wallet.short_address(),
                "No usable endpoint; skipping wallet"
            );
            RunStats::bump(&self.stats.wallets_skipped);
            report.skipped = true;
            return report;
        };

        RunStats::bump(&self.stats.wallets_started);
        tracing::info!(
            target: "round",
            wallet = wallet.index(),
            address = %wallet.short_address(),
            endpoint = %connection.endpoint(),
            "Wallet session started"
        );
        let mut ctx = WalletContext::new(wallet, connection);
        // Failovers since the last successful round; the report keeps the lifetime total.
        let mut consecutive_failovers = 0u32;

        for round in 1..=self.settings.rounds {
            if self.settings.strategy == RotationStrategy::PerRound && round > 1 {
                self.rotate(&mut ctx, round).await;
            }

            let round_ctx = RoundContext::generate(ctx.wallet().index(), round);
            match self.run_round(&ctx, &round_ctx).await {
                Ok(done) => {
                    RunStats::bump(&self.stats.rounds_completed);
                    report.rounds.push(done);
                    consecutive_failovers = 0;
                    if round < self.settings.rounds && !self.settings.round_pause.is_zero() {
                        sleep(self.settings.round_pause).await;
                    }
                }
                Err(e) => {
                    RunStats::bump(&self.stats.rounds_failed);
                    report.failed_rounds += 1;
                    tracing::warn!(
                        target: "round",
                        wallet = round_ctx.wallet_index,
                        round,
                        kind = ?e.kind(),
                        error = %e,
                        "Round failed"
                    );
                    if let Err(reason) = self
                        .recover(&mut ctx, &mut report, &mut consecutive_failovers, e)
                        .await
                    {
                        RunStats::bump(&self.stats.wallets_stopped);
                        tracing::error!(
                            target: "round",
                            wallet = round_ctx.wallet_index,
                            round,
                            reason = %reason,
                            "Stopping wallet"
                        );
                        report.stopped = Some(reason);
                        break;
                    }
                }
            }
        }

        report.endpoint = Some(ctx.endpoint().label().to_string());
        report
    }

    /// Apply the per-kind policy after a failed round. `Err` means the wallet stops.
    /// `max_failovers` bounds back-to-back failovers with no successful round between them.
    async fn recover(
        &self,
        ctx: &mut WalletContext,
        report: &mut WalletReport,
        consecutive_failovers: &mut u32,
        err: AppError,
    ) -> Result<(), String> {
        match err.kind() {
            FailureKind::Fatal => return Err(err.to_string()),
            FailureKind::Retryable => {}
            FailureKind::Connectivity => {
                if *consecutive_failovers >= self.settings.max_failovers {
                    return Err(format!(
                        "failover limit ({}) reached: {err}",
                        self.settings.max_failovers
                    ));
                }
                *consecutive_failovers += 1;
                report.failovers += 1;
                RunStats::bump(&self.stats.failovers);
                let next = ctx.connection().index().map(|i| i + 1).unwrap_or(0);
                let Some(connection) = self.pool.get_working_connection(next).await else {
                    return Err("no reachable endpoint after failover".into());
                };
                tracing::info!(
                    target: "round",
                    wallet = ctx.wallet().index(),
                    from = %ctx.endpoint(),
                    to = %connection.endpoint(),
                    "Failing over"
                );
                ctx.replace_connection(connection);
            }
        }
        if !self.settings.error_cooldown.is_zero() {
            sleep(self.settings.error_cooldown).await;
        }
        Ok(())
    }

    /// Switch to the round's endpoint unless it is already the active one. A failed
    /// switch keeps the current connection.
    async fn rotate(&self, ctx: &mut WalletContext, round: u32) {
        let Some(desired) =
            self.settings
                .strategy
                .desired_index(ctx.wallet().index(), round, self.pool.len())
        else {
            return;
        };
        if ctx.connection().index() == Some(desired) {
            return;
        }
        match self.pool.get_working_connection(desired).await {
            Some(next) => {
                tracing::debug!(
                    target: "round",
                    wallet = ctx.wallet().index(),
                    round,
                    from = %ctx.endpoint(),
                    to = %next.endpoint(),
                    "Rotating endpoint"
                );
                ctx.replace_connection(next);
            }
            None => {
                tracing::warn!(
                    target: "round",
                    wallet = ctx.wallet().index(),
                    round,
                    "Rotation found no reachable endpoint; keeping current"
                );
            }
        }
    }

    /// approve (if needed) -> swap -> stake. The first failing step aborts the round.
    pub async fn run_round(
        &self,
        ctx: &WalletContext,
        round: &RoundContext,
    ) -> Result<RoundReport, AppError> {
        let plan = &self.plan;
        let swap_amount = round.amount_for(plan.swap_token.decimals);
        let stake_amount = round.amount_for(plan.stake_token.decimals);
        tracing::info!(
            target: "round",
            wallet = round.wallet_index,
            round = round.round,
            amount = %round.human_amount(),
            swap_token = %plan.swap_token.symbol,
            endpoint = %ctx.endpoint(),
            "Round started"
        );

        let approval = self
            .pipeline
            .ensure_approval(ctx, plan.swap_token.address, plan.swap_target, swap_amount)
            .await?;
        match approval {
            ApprovalOutcome::AlreadySufficient => RunStats::bump(&self.stats.approvals_skipped),
            ApprovalOutcome::Submitted(_) => RunStats::bump(&self.stats.approvals_sent),
        }

        let swap_hash = self
            .pipeline
            .submit_swap(ctx, plan.swap_target, swap_amount)
            .await?;
        RunStats::bump(&self.stats.swaps_sent);
        tracing::info!(
            target: "round",
            wallet = round.wallet_index,
            round = round.round,
            tx = %self.tx_link(swap_hash),
            "Swap sent"
        );

        let stake_hash = self
            .pipeline
            .submit_stake(ctx, plan.staking_contract, plan.stake_token.address, stake_amount)
            .await?;
        match stake_hash {
            Some(hash) => {
                RunStats::bump(&self.stats.stakes_sent);
                tracing::info!(
                    target: "round",
                    wallet = round.wallet_index,
                    round = round.round,
                    token = %plan.stake_token.symbol,
                    tx = %self.tx_link(hash),
                    "Stake sent"
                );
            }
            None => RunStats::bump(&self.stats.stakes_skipped),
        }

        Ok(RoundReport {
            round: round.round,
            amount_cents: round.amount_cents,
            approval,
            swap_hash,
            stake_hash,
        })
    }

    fn tx_link(&self, hash: B256) -> String {
        match &self.settings.explorer_url {
            Some(prefix) => format!("{}/{hash:#x}", prefix.trim_end_matches('/')),
            None => format!("{hash:#x}"),
        }
    }
}
