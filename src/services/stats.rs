// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use std::sync::atomic::{AtomicU64, Ordering};

/// Run-wide counters, shared by every wallet worker.
#[derive(Debug, Default)]
pub struct RunStats {
    pub wallets_started: AtomicU64,
    pub wallets_skipped: AtomicU64,
    pub wallets_stopped: AtomicU64,
    pub rounds_completed: AtomicU64,
    pub rounds_failed: AtomicU64,
    pub approvals_sent: AtomicU64,
    pub approvals_skipped: AtomicU64,
    pub swaps_sent: AtomicU64,
    pub stakes_sent: AtomicU64,
    pub stakes_skipped: AtomicU64,
    pub failovers: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub wallets_started: u64,
    pub wallets_skipped: u64,
    pub wallets_stopped: u64,
    pub rounds_completed: u64,
    pub rounds_failed: u64,
    pub approvals_sent: u64,
    pub approvals_skipped: u64,
    pub swaps_sent: u64,
    pub stakes_sent: u64,
    pub stakes_skipped: u64,
    pub failovers: u64,
}

impl RunStats {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            wallets_started: load(&self.wallets_started),
            wallets_skipped: load(&self.wallets_skipped),
            wallets_stopped: load(&self.wallets_stopped),
            rounds_completed: load(&self.rounds_completed),
            rounds_failed: load(&self.rounds_failed),
            approvals_sent: load(&self.approvals_sent),
            approvals_skipped: load(&self.approvals_skipped),
            swaps_sent: load(&self.swaps_sent),
            stakes_sent: load(&self.stakes_sent),
            stakes_skipped: load(&self.stakes_skipped),
            failovers: load(&self.failovers),
        }
    }

    pub fn log_summary(&self, probes: u64, probe_failures: u64) {
        let s = self.snapshot();
        tracing::info!(
            target: "round",
            wallets = s.wallets_started,
            skipped_wallets = s.wallets_skipped,
            stopped_wallets = s.wallets_stopped,
            rounds_ok = s.rounds_completed,
            rounds_failed = s.rounds_failed,
            approvals = s.approvals_sent,
            approvals_skipped = s.approvals_skipped,
            swaps = s.swaps_sent,
            stakes = s.stakes_sent,
            stakes_skipped = s.stakes_skipped,
            failovers = s.failovers,
            probes,
            probe_failures,
            "Run finished"
        );
    }
}
