// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const NOISY_MODULES: &[&str] = &[
    "h2=info",
    "hyper=info",
    "hyper_util=info",
    "reqwest=info",
    "alloy_transport_http=info",
    "alloy_rpc_client=info",
];

/// A bare level (e.g. "debug") gets the noisy-module defaults appended. Custom
/// directive strings (with ',' or '=') are respected as-is.
pub fn filter_spec(log_level: &str) -> String {
    let normalized = log_level.trim();
    if normalized.is_empty() {
        return filter_spec("info");
    }
    if normalized.contains(',') || normalized.contains('=') {
        normalized.to_string()
    } else {
        format!("{},{}", normalized, NOISY_MODULES.join(","))
    }
}

pub fn setup_logging(log_level: &str, json_format: bool) {
    let spec = filter_spec(log_level);
    let filter = EnvFilter::from_str(&spec).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry().with(filter);

    if json_format {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(false);
        subscriber.with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer().with_target(true).compact();
        subscriber.with(fmt_layer).init();
    }

    let base = spec.split(',').next().unwrap_or("info");
    tracing::info!(
        base,
        format = if json_format { "json" } else { "compact" },
        "Logging initialized"
    );
}
