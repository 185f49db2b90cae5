//! Repository traits for the pipeline's persistent state.
//!
//! Every backend enforces the same rules: conditional (compare-and-swap)
//! status transitions, uniqueness of one payout per (bounty, pull request),
//! and no physical deletes anywhere. There is deliberately no delete method
//! on any trait; removal intents go through the protection gatekeeper and
//! end as status flips.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::{
    Bounty, BountyStatus, EnabledRepository, FundingSource, Installation, Payout, PayoutStatus,
    Transaction,
};
use crate::protection::ProtectedTable;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("storage error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Duplicate(db.message().to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

#[async_trait]
pub trait BountyStore: Send + Sync {
    /// Inserts a new bounty. Fails with `Duplicate` if an open bounty already
    /// exists for the same (repository, issue) pair.
    async fn insert_bounty(&self, bounty: Bounty) -> Result<Bounty, StoreError>;

    async fn get_bounty(&self, id: Uuid) -> Result<Bounty, StoreError>;

    /// Returns only `active` bounties for the repository.
    async fn find_active_bounties(&self, repository_id: i64) -> Result<Vec<Bounty>, StoreError>;

    async fn has_open_bounty(
        &self,
        repository_id: i64,
        issue_number: i64,
    ) -> Result<bool, StoreError>;

    /// Conditional status update. Returns `Ok(false)` when the row is no
    /// longer in `from`, so concurrent double-transitions lose cleanly
    /// instead of racing a read-then-write.
    async fn transition_bounty(
        &self,
        id: Uuid,
        from: BountyStatus,
        to: BountyStatus,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait PayoutLedger: Send + Sync {
    /// Inserts a payout. Two uniqueness keys apply: the (bounty, pull
    /// request) pair absorbs duplicate webhook deliveries, and a bounty may
    /// carry at most one non-failed payout regardless of pull request, so
    /// two merges racing for the same bounty cannot both become claimable.
    /// Either violation surfaces as `Duplicate` rather than a second row.
    async fn insert_payout(&self, payout: Payout) -> Result<Payout, StoreError>;

    async fn get_payout(&self, id: Uuid) -> Result<Payout, StoreError>;

    /// Conditional status update, same contract as `transition_bounty`.
    /// Rejects transitions the payout state machine does not allow.
    async fn transition_payout(
        &self,
        id: Uuid,
        from: PayoutStatus,
        to: PayoutStatus,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait TransactionLog: Send + Sync {
    async fn insert_transaction(&self, tx: Transaction) -> Result<Transaction, StoreError>;
}

#[async_trait]
pub trait FundingStore: Send + Sync {
    async fn insert_funding_source(
        &self,
        source: FundingSource,
    ) -> Result<FundingSource, StoreError>;

    async fn funding_source_for(
        &self,
        owner_login: &str,
    ) -> Result<Option<FundingSource>, StoreError>;

    /// Atomically reserves `amount` against the source if the provider
    /// balance minus already-reserved amounts covers it. This is the single
    /// shared-resource guard that keeps two concurrent settlements from
    /// jointly overdrawing one balance.
    async fn try_reserve(
        &self,
        source_id: Uuid,
        amount: &BigDecimal,
        available: &BigDecimal,
    ) -> Result<bool, StoreError>;

    async fn release_reservation(
        &self,
        source_id: Uuid,
        amount: &BigDecimal,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait InstallationStore: Send + Sync {
    async fn upsert_installation(&self, installation: Installation) -> Result<(), StoreError>;

    /// Soft uninstall: flips `repository_selection` to `inactive`.
    async fn deactivate_installation(&self, installation_id: i64) -> Result<(), StoreError>;

    async fn upsert_repository(&self, repository: EnabledRepository) -> Result<(), StoreError>;

    /// Soft removal: flips the row status to `inactive`.
    async fn deactivate_repository(&self, repository_id: i64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Row count for a protected table, used by the protection audit.
    async fn table_count(&self, table: ProtectedTable) -> Result<i64, StoreError>;
}

pub trait Store:
    BountyStore + PayoutLedger + TransactionLog + FundingStore + InstallationStore + AuditStore
{
}

impl<T> Store for T where
    T: BountyStore + PayoutLedger + TransactionLog + FundingStore + InstallationStore + AuditStore
{
}
