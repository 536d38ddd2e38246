// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::error::AppError;
use crate::domain::constants::{
    DEFAULT_GAS_LIMIT, DEFAULT_GAS_PREMIUM_GWEI, DEFAULT_RECEIPT_POLL_MS,
    DEFAULT_RECEIPT_TIMEOUT_MS, DEFAULT_TX_PACING_MS,
};
use crate::infrastructure::data::abi::{encode_approve, encode_stake, encode_swap};
use crate::network::gas::{GasPolicy, quote_gas_price};
use crate::network::provider::{ChainClient, ReceiptStatus};
use crate::services::context::WalletContext;
use alloy::consensus::{SignableTransaction, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, B256, Bytes, TxKind, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy_consensus::TxEnvelope;
use std::time::Duration;
use tokio::time::{Instant, sleep};

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub chain_id: u64,
    pub gas_limit: u64,
    pub gas_premium_gwei: u64,
    /// Pause after every accepted submission.
    pub pacing: Duration,
    pub wait_for_swap_receipt: bool,
    pub receipt_poll: Duration,
    pub receipt_timeout: Duration,
}

impl PipelineConfig {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            gas_limit: DEFAULT_GAS_LIMIT,
            gas_premium_gwei: DEFAULT_GAS_PREMIUM_GWEI,
            pacing: Duration::from_millis(DEFAULT_TX_PACING_MS),
            wait_for_swap_receipt: true,
            receipt_poll: Duration::from_millis(DEFAULT_RECEIPT_POLL_MS),
            receipt_timeout: Duration::from_millis(DEFAULT_RECEIPT_TIMEOUT_MS),
        }
    }
}

/// Everything needed to sign one transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionIntent {
    pub sender: Address,
    pub to: Address,
    pub input: Bytes,
    pub chain_id: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub nonce: u64,
}

#[derive(Clone, Debug)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    pub hash: B256,
}

impl TransactionIntent {
    pub fn sign(self, signer: &PrivateKeySigner) -> Result<SignedTransaction, AppError> {
        if signer.address() != self.sender {
            return Err(AppError::Signing(format!(
                "signer {:#x} does not own sender {:#x}",
                signer.address(),
                self.sender
            )));
        }
        let mut tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            to: TxKind::Call(self.to),
            value: U256::ZERO,
            input: self.input,
        };
        let sig = TxSignerSync::sign_transaction_sync(signer, &mut tx)
            .map_err(|e| AppError::Signing(format!("Sign tx failed: {}", e)))?;
        let signed: TxEnvelope = tx.into_signed(sig).into();
        Ok(SignedTransaction {
            raw: signed.encoded_2718(),
            hash: *signed.tx_hash(),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// Existing allowance already covers the amount; nothing was sent.
    AlreadySufficient,
    Submitted(B256),
}

/// Builds, signs and submits the approve / swap / stake calls. Never retries; the
/// round loop decides what a failure means.
pub struct TransactionPipeline {
    config: PipelineConfig,
}

impl TransactionPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn premium(&self) -> GasPolicy {
        GasPolicy::premium_gwei(self.config.gas_premium_gwei)
    }

    async fn pace(&self) {
        if !self.config.pacing.is_zero() {
            sleep(self.config.pacing).await;
        }
    }

    async fn submit(
        &self,
        ctx: &WalletContext,
        stage: &str,
        to: Address,
        input: Bytes,
        policy: GasPolicy,
    ) -> Result<B256, AppError> {
        let client = ctx.client();
        let sender = ctx.sender();
        // Quote before taking a nonce so a failed quote does not burn one.
        let gas_price = quote_gas_price(client, policy).await?;
        let nonce = ctx.nonces().next(client, sender).await?;

        let intent = TransactionIntent {
            sender,
            to,
            input,
            chain_id: self.config.chain_id,
            gas_price,
            gas_limit: self.config.gas_limit,
            nonce,
        };
        let signed = intent.sign(ctx.wallet().signer())?;
        let hash = client.send_raw_transaction(&signed.raw).await.map_err(|e| match e {
            AppError::Submission { reason, .. } => AppError::submission(stage, reason),
            other => other,
        })?;
        if hash != signed.hash {
            tracing::warn!(
                target: "pipeline",
                stage,
                local = %signed.hash,
                node = %hash,
                "Node returned a different transaction hash"
            );
        }
        tracing::info!(
            target: "pipeline",
            stage,
            wallet = ctx.wallet().index(),
            nonce,
            gas_price,
            tx = %hash,
            "Transaction submitted"
        );
        Ok(hash)
    }

    /// Approve `spender` for exactly `required` unless the current allowance covers it.
    pub async fn ensure_approval(
        &self,
        ctx: &WalletContext,
        token: Address,
        spender: Address,
        required: U256,
    ) -> Result<ApprovalOutcome, AppError> {
        let allowance = ctx
            .client()
            .token_allowance(token, ctx.sender(), spender)
            .await?;
        if allowance >= required {
            tracing::debug!(
                target: "pipeline",
                token = %token,
                spender = %spender,
                allowance = %allowance,
                required = %required,
                "Allowance already sufficient"
            );
            return Ok(ApprovalOutcome::AlreadySufficient);
        }

        let hash = self
            .submit(
                ctx,
                "approve",
                token,
                encode_approve(spender, required),
                self.premium(),
            )
            .await?;
        self.pace().await;
        Ok(ApprovalOutcome::Submitted(hash))
    }

    pub async fn submit_swap(
        &self,
        ctx: &WalletContext,
        target: Address,
        amount_in: U256,
    ) -> Result<B256, AppError> {
        let input = encode_swap(ctx.sender(), amount_in);
        let hash = self
            .submit(ctx, "swap", target, input, self.premium())
            .await?;
        if self.config.wait_for_swap_receipt {
            let status = self.await_receipt(ctx.client(), hash).await?;
            tracing::debug!(target: "pipeline", tx = %hash, block = ?status.block_number, "Swap confirmed");
        }
        self.pace().await;
        Ok(hash)
    }

    /// Stake up to `amount`, clamped to the sender's balance. `None` when there is
    /// nothing to stake; no transaction is sent in that case.
    pub async fn submit_stake(
        &self,
        ctx: &WalletContext,
        staking: Address,
        stake_token: Address,
        amount: U256,
    ) -> Result<Option<B256>, AppError> {
        let balance = ctx.client().token_balance(stake_token, ctx.sender()).await?;
        let stake_amount = amount.min(balance);
        if stake_amount.is_zero() {
            tracing::warn!(
                target: "pipeline",
                wallet = ctx.wallet().index(),
                token = %stake_token,
                "No stake token balance; skipping stake"
            );
            return Ok(None);
        }
        if stake_amount < amount {
            tracing::info!(
                target: "pipeline",
                requested = %amount,
                balance = %balance,
                "Stake amount clamped to balance"
            );
        }

        self.ensure_approval(ctx, stake_token, staking, stake_amount)
            .await?;
        let hash = self
            .submit(
                ctx,
                "stake",
                staking,
                encode_stake(stake_amount),
                GasPolicy::Doubled,
            )
            .await?;
        self.pace().await;
        Ok(Some(hash))
    }

    /// Poll for a receipt until it shows up or the timeout passes. A revert or a
    /// missing receipt is a failure; nothing is resubmitted.
    pub async fn await_receipt(
        &self,
        client: &dyn ChainClient,
        hash: B256,
    ) -> Result<ReceiptStatus, AppError> {
        let deadline = Instant::now() + self.config.receipt_timeout;
        loop {
            match client.receipt_status(hash).await {
                Ok(Some(status)) if status.success => return Ok(status),
                Ok(Some(_)) => {
                    return Err(AppError::Transaction {
                        hash: format!("{hash:#x}"),
                        reason: "execution reverted".into(),
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(target: "pipeline", tx = %hash, error = %e, "Receipt poll failed");
                }
            }
            if Instant::now() >= deadline {
                return Err(AppError::Transaction {
                    hash: format!("{hash:#x}"),
                    reason: format!(
                        "no receipt within {}ms",
                        self.config.receipt_timeout.as_millis()
                    ),
                });
            }
            sleep(self.config.receipt_poll).await;
        }
    }
}
