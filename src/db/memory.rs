//! In-memory store backend.
//!
//! Backs the pipeline tests and local development without Postgres. All
//! operations take one lock, which makes the conditional updates genuinely
//! atomic, the same guarantee the Postgres backend gets from conditional
//! `UPDATE ... WHERE status = $from` statements.

use std::sync::Mutex;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;

use crate::db::models::{
    Bounty, BountyStatus, EnabledRepository, FundingSource, Installation, Payout, PayoutStatus,
    Transaction,
};
use crate::db::store::{
    AuditStore, BountyStore, FundingStore, InstallationStore, PayoutLedger, StoreError,
    TransactionLog,
};
use crate::protection::ProtectedTable;

#[derive(Default)]
struct Inner {
    bounties: Vec<Bounty>,
    payouts: Vec<Payout>,
    transactions: Vec<Transaction>,
    funding_sources: Vec<FundingSource>,
    installations: Vec<Installation>,
    repositories: Vec<EnabledRepository>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panicked test thread; propagating the
        // panic is the right call here.
        self.inner.lock().expect("memory store lock poisoned")
    }

    /// Test/support helper: all transactions recorded for a payout.
    pub fn transactions_for(&self, payout_id: Uuid) -> Vec<Transaction> {
        self.lock()
            .transactions
            .iter()
            .filter(|t| t.payout_id == payout_id)
            .cloned()
            .collect()
    }

    /// Test/support helper: all payouts, regardless of status.
    pub fn all_payouts(&self) -> Vec<Payout> {
        self.lock().payouts.clone()
    }

    pub fn installation(&self, installation_id: i64) -> Option<Installation> {
        self.lock()
            .installations
            .iter()
            .find(|i| i.installation_id == installation_id)
            .cloned()
    }

    pub fn repository(&self, repository_id: i64) -> Option<EnabledRepository> {
        self.lock()
            .repositories
            .iter()
            .find(|r| r.repository_id == repository_id)
            .cloned()
    }
}

#[async_trait]
impl BountyStore for MemoryStore {
    async fn insert_bounty(&self, bounty: Bounty) -> Result<Bounty, StoreError> {
        let mut inner = self.lock();
        let open_exists = inner.bounties.iter().any(|b| {
            b.repository_id == bounty.repository_id
                && b.issue_number == bounty.issue_number
                && b.status.is_open()
        });
        if open_exists {
            return Err(StoreError::Duplicate(format!(
                "open bounty already exists for {}#{}",
                bounty.repository_full_name, bounty.issue_number
            )));
        }
        inner.bounties.push(bounty.clone());
        Ok(bounty)
    }

    async fn get_bounty(&self, id: Uuid) -> Result<Bounty, StoreError> {
        self.lock()
            .bounties
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("bounty {id}")))
    }

    async fn find_active_bounties(&self, repository_id: i64) -> Result<Vec<Bounty>, StoreError> {
        Ok(self
            .lock()
            .bounties
            .iter()
            .filter(|b| b.repository_id == repository_id && b.status == BountyStatus::Active)
            .cloned()
            .collect())
    }

    async fn has_open_bounty(
        &self,
        repository_id: i64,
        issue_number: i64,
    ) -> Result<bool, StoreError> {
        Ok(self.lock().bounties.iter().any(|b| {
            b.repository_id == repository_id
                && b.issue_number == issue_number
                && b.status.is_open()
        }))
    }

    async fn transition_bounty(
        &self,
        id: Uuid,
        from: BountyStatus,
        to: BountyStatus,
    ) -> Result<bool, StoreError> {
        if !from.can_transition(to) {
            return Err(StoreError::InvalidTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }

        let mut inner = self.lock();
        let bounty = inner
            .bounties
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("bounty {id}")))?;

        if bounty.status != from {
            return Ok(false);
        }
        bounty.status = to;
        bounty.updated_at = Utc::now();
        Ok(true)
    }
}

#[async_trait]
impl PayoutLedger for MemoryStore {
    async fn insert_payout(&self, payout: Payout) -> Result<Payout, StoreError> {
        let mut inner = self.lock();
        let duplicate = inner
            .payouts
            .iter()
            .any(|p| p.bounty_id == payout.bounty_id && p.pull_request_id == payout.pull_request_id);
        if duplicate {
            return Err(StoreError::Duplicate(format!(
                "payout already recorded for bounty {} and pull request {}",
                payout.bounty_id, payout.pull_request_id
            )));
        }
        let live = inner
            .payouts
            .iter()
            .any(|p| p.bounty_id == payout.bounty_id && p.status != PayoutStatus::Failed);
        if live {
            return Err(StoreError::Duplicate(format!(
                "a live payout already exists for bounty {}",
                payout.bounty_id
            )));
        }
        inner.payouts.push(payout.clone());
        Ok(payout)
    }

    async fn get_payout(&self, id: Uuid) -> Result<Payout, StoreError> {
        self.lock()
            .payouts
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("payout {id}")))
    }

    async fn transition_payout(
        &self,
        id: Uuid,
        from: PayoutStatus,
        to: PayoutStatus,
    ) -> Result<bool, StoreError> {
        if !from.can_transition(to) {
            return Err(StoreError::InvalidTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }

        let mut inner = self.lock();
        let payout = inner
            .payouts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("payout {id}")))?;

        if payout.status != from {
            return Ok(false);
        }
        payout.status = to;
        payout.updated_at = Utc::now();
        Ok(true)
    }
}

#[async_trait]
impl TransactionLog for MemoryStore {
    async fn insert_transaction(&self, tx: Transaction) -> Result<Transaction, StoreError> {
        self.lock().transactions.push(tx.clone());
        Ok(tx)
    }
}

#[async_trait]
impl FundingStore for MemoryStore {
    async fn insert_funding_source(
        &self,
        source: FundingSource,
    ) -> Result<FundingSource, StoreError> {
        self.lock().funding_sources.push(source.clone());
        Ok(source)
    }

    async fn funding_source_for(
        &self,
        owner_login: &str,
    ) -> Result<Option<FundingSource>, StoreError> {
        Ok(self
            .lock()
            .funding_sources
            .iter()
            .find(|s| s.owner_login == owner_login)
            .cloned())
    }

    async fn try_reserve(
        &self,
        source_id: Uuid,
        amount: &BigDecimal,
        available: &BigDecimal,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let source = inner
            .funding_sources
            .iter_mut()
            .find(|s| s.id == source_id)
            .ok_or_else(|| StoreError::NotFound(format!("funding source {source_id}")))?;

        if &(available - &source.reserved) < amount {
            return Ok(false);
        }
        source.reserved = &source.reserved + amount;
        Ok(true)
    }

    async fn release_reservation(
        &self,
        source_id: Uuid,
        amount: &BigDecimal,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let source = inner
            .funding_sources
            .iter_mut()
            .find(|s| s.id == source_id)
            .ok_or_else(|| StoreError::NotFound(format!("funding source {source_id}")))?;

        let remaining = &source.reserved - amount;
        source.reserved = if remaining < BigDecimal::from(0) {
            BigDecimal::from(0)
        } else {
            remaining
        };
        Ok(())
    }
}

#[async_trait]
impl InstallationStore for MemoryStore {
    async fn upsert_installation(&self, installation: Installation) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(existing) = inner
            .installations
            .iter_mut()
            .find(|i| i.installation_id == installation.installation_id)
        {
            existing.account_login = installation.account_login;
            existing.repository_selection = installation.repository_selection;
            existing.updated_at = Utc::now();
        } else {
            inner.installations.push(installation);
        }
        Ok(())
    }

    async fn deactivate_installation(&self, installation_id: i64) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let installation = inner
            .installations
            .iter_mut()
            .find(|i| i.installation_id == installation_id)
            .ok_or_else(|| StoreError::NotFound(format!("installation {installation_id}")))?;

        installation.repository_selection = "inactive".to_string();
        installation.updated_at = Utc::now();
        Ok(())
    }

    async fn upsert_repository(&self, repository: EnabledRepository) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(existing) = inner
            .repositories
            .iter_mut()
            .find(|r| r.repository_id == repository.repository_id)
        {
            existing.full_name = repository.full_name;
            existing.installation_id = repository.installation_id;
            existing.status = repository.status;
        } else {
            inner.repositories.push(repository);
        }
        Ok(())
    }

    async fn deactivate_repository(&self, repository_id: i64) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let repository = inner
            .repositories
            .iter_mut()
            .find(|r| r.repository_id == repository_id)
            .ok_or_else(|| StoreError::NotFound(format!("repository {repository_id}")))?;

        repository.status = "inactive".to_string();
        Ok(())
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn table_count(&self, table: ProtectedTable) -> Result<i64, StoreError> {
        let inner = self.lock();
        let count = match table {
            ProtectedTable::Bounties => inner.bounties.len(),
            ProtectedTable::Payouts => inner.payouts.len(),
            ProtectedTable::Transactions => inner.transactions.len(),
            ProtectedTable::EnabledRepositories => inner.repositories.len(),
            ProtectedTable::GithubInstallations => inner.installations.len(),
        };
        Ok(count as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Complexity;
    use std::sync::Arc;

    fn bounty() -> Bounty {
        Bounty::new(
            1,
            "acme/widget".to_string(),
            42,
            BigDecimal::from(100),
            "USD".to_string(),
            Complexity::Medium,
            "maintainer".to_string(),
        )
    }

    #[tokio::test]
    async fn rejects_second_open_bounty_for_same_issue() {
        let store = MemoryStore::new();
        store.insert_bounty(bounty()).await.unwrap();

        let second = store.insert_bounty(bounty()).await;
        assert!(matches!(second, Err(StoreError::Duplicate(_))));
    }

    #[tokio::test]
    async fn conditional_transition_fails_when_status_moved() {
        let store = MemoryStore::new();
        let b = store.insert_bounty(bounty()).await.unwrap();

        let first = store
            .transition_bounty(b.id, BountyStatus::Active, BountyStatus::PendingPayout)
            .await
            .unwrap();
        let second = store
            .transition_bounty(b.id, BountyStatus::Active, BountyStatus::PendingPayout)
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn concurrent_pending_payout_transitions_have_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let b = store.insert_bounty(bounty()).await.unwrap();

        let s1 = store.clone();
        let s2 = store.clone();
        let id = b.id;
        let t1 = tokio::spawn(async move {
            s1.transition_bounty(id, BountyStatus::Active, BountyStatus::PendingPayout)
                .await
                .unwrap()
        });
        let t2 = tokio::spawn(async move {
            s2.transition_bounty(id, BountyStatus::Active, BountyStatus::PendingPayout)
                .await
                .unwrap()
        });

        let (r1, r2) = (t1.await.unwrap(), t2.await.unwrap());
        assert!(r1 ^ r2, "exactly one concurrent transition must win");
    }

    #[tokio::test]
    async fn one_live_payout_per_bounty_across_pull_requests() {
        let store = MemoryStore::new();
        let b = store.insert_bounty(bounty()).await.unwrap();

        let first = store
            .insert_payout(Payout::for_merged_pull_request(&b, 900, 7, 55, "alice".into()))
            .await
            .unwrap();
        let second = store
            .insert_payout(Payout::for_merged_pull_request(&b, 901, 8, 56, "bob".into()))
            .await;
        assert!(matches!(second, Err(StoreError::Duplicate(_))));

        // A failed attempt no longer counts as live.
        store
            .transition_payout(first.id, PayoutStatus::PendingClaim, PayoutStatus::Failed)
            .await
            .unwrap();
        let retry = store
            .insert_payout(Payout::for_merged_pull_request(&b, 901, 8, 56, "bob".into()))
            .await;
        assert!(retry.is_ok());
    }

    #[tokio::test]
    async fn invalid_payout_transition_is_rejected() {
        let store = MemoryStore::new();
        let b = store.insert_bounty(bounty()).await.unwrap();
        let p = store
            .insert_payout(Payout::for_merged_pull_request(&b, 900, 7, 55, "alice".into()))
            .await
            .unwrap();

        let result = store
            .transition_payout(p.id, PayoutStatus::PendingClaim, PayoutStatus::Paid)
            .await;
        assert!(matches!(result, Err(StoreError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn reservation_respects_already_committed_amounts() {
        let store = MemoryStore::new();
        let source = FundingSource::connect(
            "maintainer".to_string(),
            "acct-1".to_string(),
            "USD".to_string(),
        );
        store.insert_funding_source(source.clone()).await.unwrap();

        let available = BigDecimal::from(100);
        let first = store
            .try_reserve(source.id, &BigDecimal::from(60), &available)
            .await
            .unwrap();
        let second = store
            .try_reserve(source.id, &BigDecimal::from(60), &available)
            .await
            .unwrap();

        assert!(first);
        assert!(!second, "second reservation would overdraw the source");

        store
            .release_reservation(source.id, &BigDecimal::from(60))
            .await
            .unwrap();
        let third = store
            .try_reserve(source.id, &BigDecimal::from(60), &available)
            .await
            .unwrap();
        assert!(third);
    }
}
