//! Persistent records for the bounty-to-payout pipeline.
//!
//! Statuses are typed enums stored as text. Transition legality lives next to
//! the enums so every store backend enforces the same state machine.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum BountyStatus {
    Active,
    PendingPayout,
    Paid,
    Inactive,
}

impl BountyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BountyStatus::Active => "active",
            BountyStatus::PendingPayout => "pending_payout",
            BountyStatus::Paid => "paid",
            BountyStatus::Inactive => "inactive",
        }
    }

    /// Forward-only lifecycle; `inactive` is the soft-delete terminal for
    /// anything that has not been paid out.
    pub fn can_transition(&self, next: BountyStatus) -> bool {
        use BountyStatus::*;
        matches!(
            (self, next),
            (Active, PendingPayout) | (PendingPayout, Paid) | (Active, Inactive) | (PendingPayout, Inactive)
        )
    }

    /// Statuses that count toward the one-open-bounty-per-issue invariant.
    pub fn is_open(&self) -> bool {
        matches!(self, BountyStatus::Active | BountyStatus::PendingPayout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    PendingClaim,
    Claimed,
    Paid,
    Failed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::PendingClaim => "pending_claim",
            PayoutStatus::Claimed => "claimed",
            PayoutStatus::Paid => "paid",
            PayoutStatus::Failed => "failed",
        }
    }

    /// Transitions are monotonic forward; `failed` is terminal and reachable
    /// from any in-flight state.
    pub fn can_transition(&self, next: PayoutStatus) -> bool {
        use PayoutStatus::*;
        match (self, next) {
            (Pending, PendingClaim) | (Pending, Claimed) => true,
            (PendingClaim, Claimed) => true,
            (Claimed, Paid) => true,
            (Pending, Failed) | (PendingClaim, Failed) | (Claimed, Failed) => true,
            _ => false,
        }
    }

    /// A contributor may submit a claim only while the payout is waiting on
    /// one.
    pub fn is_claimable(&self) -> bool {
        matches!(self, PayoutStatus::Pending | PayoutStatus::PendingClaim)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Bounty {
    pub id: Uuid,
    pub repository_id: i64,
    pub repository_full_name: String,
    pub issue_number: i64,
    pub amount: BigDecimal,
    pub currency: String,
    pub complexity: Complexity,
    pub status: BountyStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bounty {
    pub fn new(
        repository_id: i64,
        repository_full_name: String,
        issue_number: i64,
        amount: BigDecimal,
        currency: String,
        complexity: Complexity,
        created_by: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            repository_id,
            repository_full_name,
            issue_number,
            amount,
            currency,
            complexity,
            status: BountyStatus::Active,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payout {
    pub id: Uuid,
    /// Association to the matched bounty, captured at creation time.
    pub bounty_id: Uuid,
    pub repository_id: i64,
    pub repository_name: String,
    pub issue_number: i64,
    pub pull_request_id: i64,
    pub pull_request_number: i64,
    pub contributor_id: i64,
    pub contributor_login: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: PayoutStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payout {
    /// Builds the payout owed to the PR author for a matched bounty. Amount
    /// and currency are copied from the bounty at creation time.
    pub fn for_merged_pull_request(
        bounty: &Bounty,
        pull_request_id: i64,
        pull_request_number: i64,
        contributor_id: i64,
        contributor_login: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            bounty_id: bounty.id,
            repository_id: bounty.repository_id,
            repository_name: bounty.repository_full_name.clone(),
            issue_number: bounty.issue_number,
            pull_request_id,
            pull_request_number,
            contributor_id,
            contributor_login,
            amount: bounty.amount.clone(),
            currency: bounty.currency.clone(),
            status: PayoutStatus::PendingClaim,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub payout_id: Uuid,
    pub provider_transaction_id: Option<String>,
    pub amount: BigDecimal,
    pub fee: BigDecimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Amount and currency always come from the owning payout; a transaction
    /// never records a different amount than what the payout owes.
    pub fn for_payout(
        payout: &Payout,
        provider_transaction_id: Option<String>,
        fee: BigDecimal,
        status: TransactionStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payout_id: payout.id,
            provider_transaction_id,
            amount: payout.amount.clone(),
            fee,
            currency: payout.currency.clone(),
            status,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FundingSource {
    pub id: Uuid,
    pub owner_login: String,
    pub provider_account_id: String,
    pub currency: String,
    /// Sum of amounts committed to in-flight claims but not yet settled.
    pub reserved: BigDecimal,
    pub created_at: DateTime<Utc>,
}

impl FundingSource {
    /// A freshly connected source carries no reservations.
    pub fn connect(owner_login: String, provider_account_id: String, currency: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_login,
            provider_account_id,
            currency,
            reserved: BigDecimal::from(0),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Installation {
    pub installation_id: i64,
    pub account_login: String,
    /// `all` or `selected` while installed; flipped to `inactive` on
    /// uninstall. Rows are never removed.
    pub repository_selection: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EnabledRepository {
    pub repository_id: i64,
    pub full_name: String,
    pub installation_id: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
