// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::error::AppError;
use crate::network::provider::{ConnectionFactory, SharedClient};
use dashmap::DashMap;
use futures::future::join_all;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::time::timeout;

const DIRECT_LABEL: &str = "DIRECT";

/// A network path to the node: straight to the RPC URL, or through an HTTP proxy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    proxy: Option<String>,
    latency: Option<Duration>,
    reachable: bool,
}

impl Endpoint {
    pub fn direct() -> Self {
        Self {
            proxy: None,
            latency: None,
            reachable: false,
        }
    }

    pub fn via_proxy(proxy: impl Into<String>) -> Self {
        Self {
            proxy: Some(proxy.into()),
            latency: None,
            reachable: false,
        }
    }

    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    pub fn is_direct(&self) -> bool {
        self.proxy.is_none()
    }

    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    pub fn label(&self) -> &str {
        self.proxy.as_deref().unwrap_or(DIRECT_LABEL)
    }

    fn with_health(mut self, health: Option<&EndpointHealth>) -> Self {
        if let Some(h) = health {
            self.latency = h.latency;
            self.reachable = h.reachable;
        }
        self
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parse proxy descriptors, one per line. Blank and `#` lines are skipped and a bare
/// `host:port` gets an `http://` scheme. No descriptors means direct-only.
pub fn load_candidates(source: &str) -> Vec<Endpoint> {
    source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            if line.contains("://") {
                Endpoint::via_proxy(line)
            } else {
                Endpoint::via_proxy(format!("http://{line}"))
            }
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable(Duration),
    Unreachable(String),
}

impl ProbeOutcome {
    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeOutcome::Reachable(_))
    }
}

#[derive(Clone, Debug, Default)]
struct EndpointHealth {
    latency: Option<Duration>,
    reachable: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RotationStrategy {
    /// One endpoint per wallet, kept for all of its rounds.
    #[default]
    PerWallet,
    /// Desired endpoint follows the round number.
    PerRound,
}

impl RotationStrategy {
    /// Both indices are 1-based.
    pub fn desired_index(&self, wallet_index: usize, round: u32, candidates: usize) -> Option<usize> {
        if candidates == 0 {
            return None;
        }
        let slot = match self {
            RotationStrategy::PerWallet => wallet_index.saturating_sub(1),
            RotationStrategy::PerRound => (round as usize).saturating_sub(1),
        };
        Some(slot % candidates)
    }

    /// Lenient parse: anything unknown falls back to per-wallet.
    pub fn parse_or_default(raw: &str) -> Self {
        raw.parse().unwrap_or_else(|_| {
            tracing::warn!(target: "pool", strategy = raw, "Unknown proxy strategy; using per_wallet");
            RotationStrategy::PerWallet
        })
    }
}

impl FromStr for RotationStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_wallet" | "per-wallet" | "" => Ok(RotationStrategy::PerWallet),
            "per_round" | "per-round" => Ok(RotationStrategy::PerRound),
            other => Err(AppError::Config(format!("Unknown proxy strategy '{other}'"))),
        }
    }
}

impl fmt::Display for RotationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationStrategy::PerWallet => f.write_str("per_wallet"),
            RotationStrategy::PerRound => f.write_str("per_round"),
        }
    }
}

/// A live client plus the endpoint it is bound to.
#[derive(Clone)]
pub struct ActiveConnection {
    client: SharedClient,
    endpoint: Endpoint,
    index: Option<usize>,
}

impl ActiveConnection {
    pub fn new(client: SharedClient, endpoint: Endpoint, index: Option<usize>) -> Self {
        Self {
            client,
            endpoint,
            index,
        }
    }

    pub fn client(&self) -> &SharedClient {
        &self.client
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Position in the candidate list; `None` for the direct fallback.
    pub fn index(&self) -> Option<usize> {
        self.index
    }
}

impl fmt::Debug for ActiveConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveConnection")
            .field("endpoint", &self.endpoint)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

pub struct EndpointPool {
    candidates: Vec<Endpoint>,
    health: DashMap<String, EndpointHealth>,
    factory: Arc<dyn ConnectionFactory>,
    probe_timeout: Duration,
    probes: AtomicU64,
    probe_failures: AtomicU64,
}

impl EndpointPool {
    pub fn new(
        candidates: Vec<Endpoint>,
        factory: Arc<dyn ConnectionFactory>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            candidates,
            health: DashMap::new(),
            factory,
            probe_timeout,
            probes: AtomicU64::new(0),
            probe_failures: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Candidates in selection order, with their last probe results.
    pub fn candidates(&self) -> Vec<Endpoint> {
        self.candidates
            .iter()
            .cloned()
            .map(|e| {
                let health = self.health.get(e.label()).map(|h| h.clone());
                e.with_health(health.as_ref())
            })
            .collect()
    }

    pub fn probe_count(&self) -> u64 {
        self.probes.load(Ordering::Relaxed)
    }

    pub fn probe_failures(&self) -> u64 {
        self.probe_failures.load(Ordering::Relaxed)
    }

    /// Liveness check through `endpoint`. Never fails; unreachability is the result.
    pub async fn probe(&self, endpoint: &Endpoint) -> ProbeOutcome {
        self.probe_connect(endpoint).await.0
    }

    async fn probe_connect(&self, endpoint: &Endpoint) -> (ProbeOutcome, Option<SharedClient>) {
        let started = Instant::now();
        let attempt = async {
            let client = self.factory.connect(endpoint).await?;
            client.block_number().await?;
            Ok::<_, AppError>(client)
        };

        let (outcome, client) = match timeout(self.probe_timeout, attempt).await {
            Ok(Ok(client)) => (ProbeOutcome::Reachable(started.elapsed()), Some(client)),
            Ok(Err(e)) => (ProbeOutcome::Unreachable(e.to_string()), None),
            Err(_) => (
                ProbeOutcome::Unreachable(format!(
                    "no response within {}ms",
                    self.probe_timeout.as_millis()
                )),
                None,
            ),
        };
        self.record(endpoint, &outcome);
        (outcome, client)
    }

    fn record(&self, endpoint: &Endpoint, outcome: &ProbeOutcome) {
        self.probes.fetch_add(1, Ordering::Relaxed);
        let health = match outcome {
            ProbeOutcome::Reachable(latency) => {
                tracing::debug!(
                    target: "pool",
                    endpoint = %endpoint,
                    latency_ms = latency.as_millis() as u64,
                    "Endpoint reachable"
                );
                EndpointHealth {
                    latency: Some(*latency),
                    reachable: true,
                }
            }
            ProbeOutcome::Unreachable(reason) => {
                self.probe_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(target: "pool", endpoint = %endpoint, reason = %reason, "Endpoint unreachable");
                EndpointHealth {
                    latency: None,
                    reachable: false,
                }
            }
        };
        self.health.insert(endpoint.label().to_string(), health);
    }

    /// Probe every candidate concurrently and return the lowest-latency reachable one.
    pub async fn select_fastest(&self, candidates: &[Endpoint]) -> Option<Endpoint> {
        let outcomes = join_all(candidates.iter().map(|c| self.probe(c))).await;
        let mut reachable: Vec<(Duration, &Endpoint)> = candidates
            .iter()
            .zip(outcomes)
            .filter_map(|(endpoint, outcome)| match outcome {
                ProbeOutcome::Reachable(latency) => Some((latency, endpoint)),
                ProbeOutcome::Unreachable(_) => None,
            })
            .collect();
        reachable.sort_by_key(|(latency, _)| *latency);
        reachable.first().map(|(latency, endpoint)| {
            let mut best = (*endpoint).clone();
            best.latency = Some(*latency);
            best.reachable = true;
            best
        })
    }

    /// Reorder candidates fastest-first; unreachable ones keep their relative order at the end.
    pub async fn rank_by_latency(&mut self) -> Option<Endpoint> {
        let snapshot = self.candidates.clone();
        let best = self.select_fastest(&snapshot).await;
        let mut ranked = self.candidates();
        ranked.sort_by_key(|e| (!e.reachable, e.latency.unwrap_or(Duration::MAX)));
        self.candidates = ranked;
        tracing::info!(
            target: "pool",
            order = %self.candidates.iter().map(|e| e.label()).collect::<Vec<_>>().join(","),
            "Ranked endpoints by latency"
        );
        best
    }

    /// Try candidates round-robin from `start_index`, then a direct connection.
    /// `None` only when the node is unreachable on every path.
    pub async fn get_working_connection(&self, start_index: usize) -> Option<ActiveConnection> {
        let n = self.candidates.len();
        for offset in 0..n {
            let index = (start_index + offset) % n;
            let endpoint = &self.candidates[index];
            if let (ProbeOutcome::Reachable(latency), Some(client)) =
                self.probe_connect(endpoint).await
            {
                let mut endpoint = endpoint.clone();
                endpoint.latency = Some(latency);
                endpoint.reachable = true;
                return Some(ActiveConnection::new(client, endpoint, Some(index)));
            }
        }

        if n > 0 {
            tracing::warn!(target: "pool", candidates = n, "No proxy reachable; trying direct connection");
        }
        let direct = Endpoint::direct();
        match self.probe_connect(&direct).await {
            (ProbeOutcome::Reachable(latency), Some(client)) => {
                let mut endpoint = direct;
                endpoint.latency = Some(latency);
                endpoint.reachable = true;
                Some(ActiveConnection::new(client, endpoint, None))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::mock::{MockChain, MockFactory};

    fn pool(factory: MockFactory, proxies: &[&str]) -> EndpointPool {
        EndpointPool::new(
            proxies.iter().map(|p| Endpoint::via_proxy(*p)).collect(),
            Arc::new(factory),
            Duration::from_millis(200),
        )
    }

    #[test]
    fn load_candidates_skips_comments_and_adds_scheme() {
        let source = "\n# primary pool\nhttp://user:pw@10.0.0.1:8080\n   \n10.0.0.2:3128\nsocks5://10.0.0.3:1080\n";
        let got = load_candidates(source);
        let labels: Vec<&str> = got.iter().map(|e| e.label()).collect();
        assert_eq!(
            labels,
            vec![
                "http://user:pw@10.0.0.1:8080",
                "http://10.0.0.2:3128",
                "socks5://10.0.0.3:1080"
            ]
        );
        assert!(load_candidates("").is_empty());
        assert!(load_candidates("# only comments\n\n").is_empty());
    }

    #[test]
    fn rotation_indices_follow_wallet_or_round() {
        let per_wallet = RotationStrategy::PerWallet;
        assert_eq!(per_wallet.desired_index(1, 7, 3), Some(0));
        assert_eq!(per_wallet.desired_index(4, 1, 3), Some(0));
        assert_eq!(per_wallet.desired_index(2, 99, 3), Some(1));

        let per_round = RotationStrategy::PerRound;
        assert_eq!(per_round.desired_index(5, 1, 3), Some(0));
        assert_eq!(per_round.desired_index(5, 3, 3), Some(2));
        assert_eq!(per_round.desired_index(5, 4, 3), Some(0));
        assert_eq!(per_round.desired_index(1, 1, 0), None);
    }

    #[test]
    fn strategy_parsing_is_lenient() {
        assert_eq!(RotationStrategy::parse_or_default(" PER_ROUND "), RotationStrategy::PerRound);
        assert_eq!(RotationStrategy::parse_or_default("random"), RotationStrategy::PerWallet);
        assert!("random".parse::<RotationStrategy>().is_err());
        assert_eq!(RotationStrategy::PerRound.to_string(), "per_round");
    }

    #[tokio::test]
    async fn probe_classifies_without_raising() {
        let chain = MockChain::new();
        let factory = MockFactory::new(chain).with_dead("http://dead:1");
        let pool = pool(factory, &["http://dead:1", "http://alive:1"]);

        assert!(!pool.probe(&Endpoint::via_proxy("http://dead:1")).await.is_reachable());
        assert!(pool.probe(&Endpoint::via_proxy("http://alive:1")).await.is_reachable());
        assert_eq!(pool.probe_failures(), 1);

        let snapshot = pool.candidates();
        assert!(!snapshot[0].is_reachable());
        assert!(snapshot[1].is_reachable());
        assert!(snapshot[1].latency().is_some());
    }

    #[tokio::test]
    async fn probe_times_out_on_hanging_endpoint() {
        let chain = MockChain::new();
        let factory = MockFactory::new(chain).with_hanging("http://slow:1");
        let pool = pool(factory, &["http://slow:1"]);

        let outcome = pool.probe(&Endpoint::via_proxy("http://slow:1")).await;
        assert!(matches!(outcome, ProbeOutcome::Unreachable(msg) if msg.contains("200ms")));
    }

    #[tokio::test]
    async fn select_fastest_orders_by_latency_and_skips_dead() {
        let chain = MockChain::new();
        let factory = MockFactory::new(chain)
            .with_dead("http://dead:1")
            .with_delay("http://slow:1", Duration::from_millis(60))
            .with_delay("http://fast:1", Duration::from_millis(5));
        let candidates = vec![
            Endpoint::via_proxy("http://dead:1"),
            Endpoint::via_proxy("http://slow:1"),
            Endpoint::via_proxy("http://fast:1"),
        ];
        let pool = pool(factory, &["http://dead:1", "http://slow:1", "http://fast:1"]);

        let best = pool.select_fastest(&candidates).await.expect("reachable");
        assert_eq!(best.label(), "http://fast:1");
        assert!(best.is_reachable());
    }

    #[tokio::test]
    async fn select_fastest_returns_none_when_all_dead() {
        let chain = MockChain::new();
        let factory = MockFactory::new(chain)
            .with_dead("http://a:1")
            .with_dead("http://b:1");
        let pool = pool(factory, &["http://a:1", "http://b:1"]);
        let candidates = pool.candidates();
        assert!(pool.select_fastest(&candidates).await.is_none());
    }

    #[tokio::test]
    async fn rank_by_latency_moves_fastest_first() {
        let chain = MockChain::new();
        let factory = MockFactory::new(chain)
            .with_dead("http://dead:1")
            .with_delay("http://slow:1", Duration::from_millis(60));
        let mut pool = pool(factory, &["http://dead:1", "http://slow:1", "http://fast:1"]);

        let best = pool.rank_by_latency().await.expect("best");
        assert_eq!(best.label(), "http://fast:1");
        let order: Vec<String> = pool.candidates().iter().map(|e| e.label().to_string()).collect();
        assert_eq!(order, vec!["http://fast:1", "http://slow:1", "http://dead:1"]);
    }

    #[tokio::test]
    async fn working_connection_walks_round_robin_from_start() {
        let chain = MockChain::new();
        let factory = MockFactory::new(chain).with_dead("http://b:1");
        let pool = pool(factory, &["http://a:1", "http://b:1", "http://c:1"]);

        let active = pool.get_working_connection(1).await.expect("connection");
        assert_eq!(active.endpoint().label(), "http://c:1");
        assert_eq!(active.index(), Some(2));
        assert_eq!(pool.probe_failures(), 1);
    }

    #[tokio::test]
    async fn working_connection_falls_back_to_direct() {
        let chain = MockChain::new();
        let factory = MockFactory::new(chain)
            .with_dead("http://a:1")
            .with_dead("http://b:1");
        let pool = pool(factory, &["http://a:1", "http://b:1"]);

        let active = pool.get_working_connection(0).await.expect("direct fallback");
        assert!(active.endpoint().is_direct());
        assert_eq!(active.index(), None);
        assert_eq!(pool.probe_failures(), 2);
    }

    #[tokio::test]
    async fn working_connection_none_when_direct_also_fails() {
        let chain = MockChain::new();
        let factory = MockFactory::new(chain)
            .with_dead("http://a:1")
            .with_dead(DIRECT_LABEL);
        let pool = pool(factory, &["http://a:1"]);
        assert!(pool.get_working_connection(0).await.is_none());

        let chain = MockChain::new();
        let direct_only = EndpointPool::new(
            Vec::new(),
            Arc::new(MockFactory::new(chain)),
            Duration::from_millis(200),
        );
        let active = direct_only.get_working_connection(0).await.expect("direct");
        assert!(active.endpoint().is_direct());
    }
}
