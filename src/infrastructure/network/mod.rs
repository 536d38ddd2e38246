// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod endpoint;
pub mod gas;
#[cfg(test)]
pub mod mock;
pub mod nonce;
pub mod provider;
