//! Data-preservation gatekeeper.
//!
//! Every destructive intent against a protected table routes through here.
//! Hard deletes are always rejected and logged; the only sanctioned removal
//! path is a status flip. No code path in this service physically deletes a
//! bounty, payout, transaction, repository, or installation row.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::BountyStatus;
use crate::db::store::Store;
use crate::error::AppError;

pub const PROTECTION_POLICIES: &[&str] = &[
    "hard deletes against protected tables are rejected",
    "removals are status flips (soft delete) only",
    "every removal attempt is logged",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectedTable {
    Bounties,
    Payouts,
    Transactions,
    EnabledRepositories,
    GithubInstallations,
}

impl ProtectedTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtectedTable::Bounties => "bounties",
            ProtectedTable::Payouts => "payouts",
            ProtectedTable::Transactions => "transactions",
            ProtectedTable::EnabledRepositories => "enabled_repositories",
            ProtectedTable::GithubInstallations => "github_installations",
        }
    }

    pub fn all() -> &'static [ProtectedTable] {
        &[
            ProtectedTable::Bounties,
            ProtectedTable::Payouts,
            ProtectedTable::Transactions,
            ProtectedTable::EnabledRepositories,
            ProtectedTable::GithubInstallations,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalIntent {
    Delete,
    Remove,
    Purge,
}

impl RemovalIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalIntent::Delete => "delete",
            RemovalIntent::Remove => "remove",
            RemovalIntent::Purge => "purge",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TableCount {
    pub table: ProtectedTable,
    pub rows: i64,
}

#[derive(Debug, Serialize)]
pub struct ProtectionAudit {
    pub tables: Vec<TableCount>,
    pub policies: Vec<&'static str>,
}

pub struct ProtectionGatekeeper {
    store: Arc<dyn Store>,
}

impl ProtectionGatekeeper {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Rejects a hard-delete intent. Never touches the store; the returned
    /// error is the whole outcome, plus an audit log line.
    pub fn block_removal(
        &self,
        table: ProtectedTable,
        intent: RemovalIntent,
        requested_by: &str,
    ) -> AppError {
        tracing::warn!(
            table = table.as_str(),
            intent = intent.as_str(),
            requested_by,
            "blocked removal attempt against protected table"
        );

        AppError::ProtectionViolation(format!(
            "{} on {} is not permitted; records are preserved, use soft delete instead",
            intent.as_str(),
            table.as_str()
        ))
    }

    /// Sanctioned removal path for bounties: flips status to `inactive`.
    pub async fn soft_delete_bounty(
        &self,
        bounty_id: Uuid,
        requested_by: &str,
    ) -> Result<(), AppError> {
        let bounty = self.store.get_bounty(bounty_id).await?;

        if !bounty.status.can_transition(BountyStatus::Inactive) {
            return Err(AppError::InvalidStateTransition {
                from: bounty.status.as_str().to_string(),
                to: BountyStatus::Inactive.as_str().to_string(),
            });
        }

        let flipped = self
            .store
            .transition_bounty(bounty_id, bounty.status, BountyStatus::Inactive)
            .await?;
        if !flipped {
            return Err(AppError::Conflict(
                "bounty status changed concurrently; soft delete not applied".to_string(),
            ));
        }

        tracing::info!(
            %bounty_id,
            requested_by,
            "bounty soft-deleted (status flipped to inactive)"
        );
        Ok(())
    }

    /// Sanctioned removal path for enabled repositories.
    pub async fn deactivate_repository(
        &self,
        repository_id: i64,
        requested_by: &str,
    ) -> Result<(), AppError> {
        self.store.deactivate_repository(repository_id).await?;
        tracing::info!(repository_id, requested_by, "repository marked inactive");
        Ok(())
    }

    /// Sanctioned removal path for installations (uninstall webhook).
    pub async fn deactivate_installation(
        &self,
        installation_id: i64,
        requested_by: &str,
    ) -> Result<(), AppError> {
        self.store.deactivate_installation(installation_id).await?;
        tracing::info!(
            installation_id,
            requested_by,
            "installation marked inactive (repository_selection flipped)"
        );
        Ok(())
    }

    /// Aggregate row counts per protected table plus the active policy list,
    /// for external verification that nothing went missing.
    pub async fn audit(&self) -> Result<ProtectionAudit, AppError> {
        let mut tables = Vec::with_capacity(ProtectedTable::all().len());
        for table in ProtectedTable::all() {
            let rows = self.store.table_count(*table).await?;
            tables.push(TableCount { table: *table, rows });
        }

        Ok(ProtectionAudit {
            tables,
            policies: PROTECTION_POLICIES.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protected_table_names_match_store_tables() {
        let names: Vec<&str> = ProtectedTable::all().iter().map(|t| t.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "bounties",
                "payouts",
                "transactions",
                "enabled_repositories",
                "github_installations"
            ]
        );
    }

    #[test]
    fn policy_list_is_not_empty() {
        assert_eq!(PROTECTION_POLICIES.len(), 3);
    }
}
