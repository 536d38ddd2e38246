// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use clap::Parser;
use std::sync::Arc;
use swapstake_runner::app::config::GlobalSettings;
use swapstake_runner::app::logging::setup_logging;
use swapstake_runner::domain::error::AppError;
use swapstake_runner::network::endpoint::{EndpointPool, RotationStrategy};
use swapstake_runner::network::provider::RpcConnectionFactory;
use swapstake_runner::services::orchestrator::RoundOrchestrator;
use swapstake_runner::services::pipeline::TransactionPipeline;

#[derive(Parser, Debug)]
#[command(author, version, about = "approve -> swap -> stake round runner")]
struct Cli {
    /// Path to config file (default: network_config.* / config.*)
    #[arg(long, env = "CONFIG_PATH")]
    config: Option<String>,

    /// Rounds per wallet (overrides config/env)
    #[arg(long)]
    rounds: Option<u32>,

    /// Endpoint rotation: per_wallet | per_round
    #[arg(long)]
    proxy_strategy: Option<String>,

    /// Log level or directive string (e.g. "info,pool=debug")
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let mut settings = GlobalSettings::load_with_path(cli.config.as_deref())?;
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| if settings.debug { "debug" } else { "info" }.to_string());
    setup_logging(&level, cli.json_logs);

    if let Some(rounds) = cli.rounds {
        settings.rounds = rounds;
    }
    if let Some(strategy) = cli.proxy_strategy.as_deref() {
        settings.proxy_strategy = strategy.parse::<RotationStrategy>()?.to_string();
    }

    let wallets = settings.wallets()?;
    let plan = settings.trade_plan()?;
    let candidates = settings.proxy_candidates()?;
    let rpc_url = settings.rpc_url()?;
    tracing::info!(
        target: "config",
        chain_id = settings.chain_id()?,
        rpc = %rpc_url,
        wallets = wallets.len(),
        proxies = candidates.len(),
        swap_token = %plan.swap_token.symbol,
        stake_token = %plan.stake_token.symbol,
        strategy = %settings.rotation_strategy(),
        "Configuration loaded"
    );
    if candidates.is_empty() {
        tracing::info!(target: "pool", "No proxies configured; using direct connection only");
    }

    let factory = RpcConnectionFactory::new(&rpc_url, settings.request_timeout())?;
    let mut pool = EndpointPool::new(candidates, Arc::new(factory), settings.probe_timeout());
    if settings.rank_endpoints_by_latency && !pool.is_empty() {
        match pool.rank_by_latency().await {
            Some(best) => tracing::info!(target: "pool", best = %best, "Fastest endpoint"),
            None => tracing::warn!(target: "pool", "No proxy answered the latency probe"),
        }
    }

    let pipeline = TransactionPipeline::new(settings.pipeline_config()?);
    let orchestrator = RoundOrchestrator::new(
        Arc::new(pool),
        Arc::new(pipeline),
        plan,
        settings.run_settings(),
    );

    let reports = orchestrator.run(wallets).await;
    for report in &reports {
        tracing::info!(
            target: "round",
            wallet = report.wallet_index,
            address = %report.address,
            endpoint = report.endpoint.as_deref().unwrap_or("-"),
            rounds_ok = report.rounds.len(),
            rounds_failed = report.failed_rounds,
            failovers = report.failovers,
            skipped = report.skipped,
            stopped = report.stopped.as_deref().unwrap_or(""),
            "Wallet finished"
        );
    }
    Ok(())
}
