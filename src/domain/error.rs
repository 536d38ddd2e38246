// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Connection failed to endpoint: {0}")]
    Connection(String),

    #[error("Nonce query failed for {address}: {reason}")]
    Nonce { address: String, reason: String },

    #[error("Submission failed during {stage}: {reason}")]
    Submission { stage: String, reason: String },

    #[error("Transaction failed: {hash:?}, reason: {reason}")]
    Transaction { hash: String, reason: String },

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Address {0} is invalid or not checksummed")]
    InvalidAddress(String),

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

/// How the round loop should react to a failed step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// Endpoint unreachable or transport broken; rotate to another endpoint.
    Connectivity,
    /// Node rejected, reverted, or a read failed; cool down and try the next round.
    Retryable,
    /// Nothing later rounds can fix.
    Fatal,
}

impl AppError {
    pub fn submission(stage: &str, reason: impl std::fmt::Display) -> Self {
        AppError::Submission {
            stage: stage.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            AppError::Connection(_) => FailureKind::Connectivity,
            AppError::Nonce { .. } | AppError::Submission { .. } | AppError::Transaction { .. } => {
                FailureKind::Retryable
            }
            AppError::Config(_)
            | AppError::Initialization(_)
            | AppError::Signing(_)
            | AppError::InvalidAddress(_)
            | AppError::Unknown(_) => FailureKind::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == FailureKind::Fatal
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
