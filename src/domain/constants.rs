// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use std::time::Duration;

// =============================================================================
// CALL SELECTORS
// =============================================================================

/// ERC-20 `approve(address,uint256)`.
pub const APPROVE_SELECTOR: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];
/// Stable-swap entry point taking `(address,uint256,uint256,uint256,uint256,uint256,uint256)`.
pub const SWAP_SELECTOR: [u8; 4] = [0x09, 0x5e, 0x7a, 0x95];
/// Staking deposit taking ten `uint256` slots.
pub const STAKE_SELECTOR: [u8; 4] = [0x1a, 0x5f, 0x0f, 0x00];

pub const SWAP_ZERO_SLOTS: usize = 5;
pub const STAKE_ARG_SLOTS: usize = 10;

// =============================================================================
// GAS & TRANSACTION CONSTANTS
// =============================================================================

pub const DEFAULT_GAS_LIMIT: u64 = 600_000;
pub const DEFAULT_GAS_PREMIUM_GWEI: u64 = 5;
pub const GWEI: u128 = 1_000_000_000;

// =============================================================================
// PACING & TIMEOUTS
// =============================================================================

pub const DEFAULT_ROUNDS: u32 = 95;
pub const DEFAULT_TX_PACING_MS: u64 = 2_000;
pub const DEFAULT_ROUND_PAUSE_MS: u64 = 3_000;
pub const DEFAULT_ERROR_COOLDOWN_MS: u64 = 2_000;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 25_000;
pub const DEFAULT_RECEIPT_POLL_MS: u64 = 500;
pub const DEFAULT_RECEIPT_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_MAX_FAILOVERS: u32 = 3;

// Chain reads (nonce, allowance, balance, gas price).
pub const READ_RETRY_ATTEMPTS: usize = 3;
pub const READ_RETRY_DELAY: Duration = Duration::from_millis(100);

// =============================================================================
// AMOUNT GENERATION
// =============================================================================

/// Per-round human amount bounds, in hundredths of a token (0.10 ..= 1.00).
pub const MIN_ROUND_AMOUNT_CENTS: u64 = 10;
pub const MAX_ROUND_AMOUNT_CENTS: u64 = 100;

pub const DEFAULT_SWAP_TOKEN: &str = "USDC";
pub const DEFAULT_STAKE_TOKEN: &str = "R2USD";
