//! Claim and settlement: validates a contributor's claim, reserves funds,
//! executes the provider transfer, and records the result.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::{BountyStatus, PayoutStatus, Transaction, TransactionStatus};
use crate::db::store::Store;
use crate::error::AppError;
use crate::payments::{platform_fee, PaymentProvider, TransferRequest};
use crate::validation::{validate_bank_details, validate_wallet_address};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Destination {
    Wallet {
        address: String,
    },
    Bank {
        account_number: String,
        routing_number: String,
    },
}

impl Destination {
    fn validate(&self) -> Result<(), AppError> {
        match self {
            Destination::Wallet { address } => validate_wallet_address(address)?,
            Destination::Bank {
                account_number,
                routing_number,
            } => validate_bank_details(account_number, routing_number)?,
        }
        Ok(())
    }

    fn provider_destination(&self) -> String {
        match self {
            Destination::Wallet { address } => address.clone(),
            Destination::Bank { account_number, .. } => account_number.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaimRequest {
    pub payout_id: Uuid,
    pub contributor_id: i64,
    pub destination: Destination,
}

#[derive(Debug, Serialize)]
pub struct ClaimReceipt {
    pub payout_id: Uuid,
    pub transaction_id: Uuid,
    pub provider_transaction_id: Option<String>,
    pub amount: bigdecimal::BigDecimal,
    pub fee: bigdecimal::BigDecimal,
    pub status: PayoutStatus,
}

pub struct ClaimProcessor {
    store: Arc<dyn Store>,
    payments: Arc<dyn PaymentProvider>,
}

impl ClaimProcessor {
    pub fn new(store: Arc<dyn Store>, payments: Arc<dyn PaymentProvider>) -> Self {
        Self { store, payments }
    }

    pub async fn process(&self, request: &ClaimRequest) -> Result<ClaimReceipt, AppError> {
        request.destination.validate()?;

        let payout = self.store.get_payout(request.payout_id).await?;
        if payout.contributor_id != request.contributor_id {
            return Err(AppError::Forbidden(
                "payout belongs to a different contributor".to_string(),
            ));
        }
        if !payout.status.is_claimable() {
            return Err(AppError::AlreadyProcessed(format!(
                "payout is {}",
                payout.status.as_str()
            )));
        }

        let bounty = self.store.get_bounty(payout.bounty_id).await?;
        let source = self
            .store
            .funding_source_for(&bounty.created_by)
            .await?
            .ok_or_else(|| {
                AppError::FundingSourceMissing(format!(
                    "no funding source connected for {}",
                    bounty.created_by
                ))
            })?;

        let available = self
            .payments
            .available_balance(&source.provider_account_id, &payout.currency)
            .await?;

        // Atomic conditional reservation: the balance check also counts
        // amounts committed to other in-flight claims, so two concurrent
        // settlements cannot jointly overdraw the source.
        let reserved = self
            .store
            .try_reserve(source.id, &payout.amount, &available)
            .await?;
        if !reserved {
            return Err(AppError::InsufficientFunds(format!(
                "requested {} {}, {} available after in-flight claims",
                payout.amount, payout.currency, available
            )));
        }

        // Claim the payout before calling the provider; a concurrent claim
        // for the same payout loses here instead of double-paying.
        let claimed = self
            .store
            .transition_payout(payout.id, payout.status, PayoutStatus::Claimed)
            .await?;
        if !claimed {
            self.store
                .release_reservation(source.id, &payout.amount)
                .await?;
            return Err(AppError::AlreadyProcessed(
                "payout was claimed concurrently".to_string(),
            ));
        }

        let transfer = TransferRequest {
            source_account: source.provider_account_id.clone(),
            destination: request.destination.provider_destination(),
            amount: payout.amount.clone(),
            currency: payout.currency.clone(),
            reference: payout.id.to_string(),
        };

        let provider_tx = match self.payments.execute_transfer(&transfer).await {
            Ok(tx) => tx,
            Err(err) => {
                // A failed transfer must not leave the payout ambiguous:
                // record the attempt, mark the payout failed, free the funds.
                tracing::error!(payout_id = %payout.id, error = %err, "transfer failed");

                let attempt = Transaction::for_payout(
                    &payout,
                    None,
                    platform_fee(&payout.amount),
                    TransactionStatus::Failed,
                );
                if let Err(log_err) = self.store.insert_transaction(attempt).await {
                    tracing::error!(payout_id = %payout.id, error = %log_err, "failed to record transfer attempt");
                }

                if let Err(release_err) = self
                    .store
                    .release_reservation(source.id, &payout.amount)
                    .await
                {
                    tracing::error!(payout_id = %payout.id, error = %release_err, "failed to release reservation");
                }

                // The provider error is the caller-facing outcome; a store
                // failure here is logged, never substituted for it.
                match self
                    .store
                    .transition_payout(payout.id, PayoutStatus::Claimed, PayoutStatus::Failed)
                    .await
                {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::error!(payout_id = %payout.id, "payout left claimed after transfer failure");
                    }
                    Err(flip_err) => {
                        tracing::error!(
                            payout_id = %payout.id,
                            error = %flip_err,
                            "failed to mark payout failed after transfer failure"
                        );
                    }
                }

                return Err(err.into());
            }
        };

        // The transaction row is written before the status flip. If the flip
        // fails after money moved, the completed transaction remains the
        // source of truth for reconciliation.
        let fee = platform_fee(&payout.amount);
        let tx = Transaction::for_payout(
            &payout,
            Some(provider_tx.id.clone()),
            fee.clone(),
            TransactionStatus::Completed,
        );
        let tx = self.store.insert_transaction(tx).await?;

        let mut final_status = PayoutStatus::Paid;
        match self
            .store
            .transition_payout(payout.id, PayoutStatus::Claimed, PayoutStatus::Paid)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!(
                    payout_id = %payout.id,
                    provider_transaction_id = %provider_tx.id,
                    "transfer settled but payout status flip lost; needs reconciliation"
                );
                final_status = PayoutStatus::Claimed;
            }
            Err(err) => {
                tracing::error!(
                    payout_id = %payout.id,
                    provider_transaction_id = %provider_tx.id,
                    error = %err,
                    "transfer settled but payout status update failed; needs reconciliation"
                );
                final_status = PayoutStatus::Claimed;
            }
        }

        self.store
            .release_reservation(source.id, &payout.amount)
            .await?;

        if !self
            .store
            .transition_bounty(bounty.id, BountyStatus::PendingPayout, BountyStatus::Paid)
            .await?
        {
            tracing::debug!(bounty_id = %bounty.id, "bounty was not in pending_payout at settlement");
        }

        tracing::info!(
            payout_id = %payout.id,
            transaction_id = %tx.id,
            amount = %tx.amount,
            fee = %tx.fee,
            "payout settled"
        );

        Ok(ClaimReceipt {
            payout_id: payout.id,
            transaction_id: tx.id,
            provider_transaction_id: tx.provider_transaction_id.clone(),
            amount: tx.amount.clone(),
            fee: tx.fee.clone(),
            status: final_status,
        })
    }
}
