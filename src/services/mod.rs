// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod context;
pub mod orchestrator;
pub mod pipeline;
pub mod stats;
