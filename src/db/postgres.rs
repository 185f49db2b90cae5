//! Postgres store backend.
//!
//! Conditional updates (`WHERE status = $from`) provide the compare-and-swap
//! semantics; unique indexes provide the idempotency keys. Nothing here
//! issues a DELETE.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sqlx::PgPool;
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

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BountyStore for PgStore {
    async fn insert_bounty(&self, bounty: Bounty) -> Result<Bounty, StoreError> {
        let inserted = sqlx::query_as::<_, Bounty>(
            r#"
            INSERT INTO bounties (
                id, repository_id, repository_full_name, issue_number,
                amount, currency, complexity, status, created_by, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(bounty.id)
        .bind(bounty.repository_id)
        .bind(&bounty.repository_full_name)
        .bind(bounty.issue_number)
        .bind(&bounty.amount)
        .bind(&bounty.currency)
        .bind(bounty.complexity)
        .bind(bounty.status)
        .bind(&bounty.created_by)
        .bind(bounty.created_at)
        .bind(bounty.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(inserted)
    }

    async fn get_bounty(&self, id: Uuid) -> Result<Bounty, StoreError> {
        sqlx::query_as::<_, Bounty>("SELECT * FROM bounties WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("bounty {id}")))
    }

    async fn find_active_bounties(&self, repository_id: i64) -> Result<Vec<Bounty>, StoreError> {
        let bounties = sqlx::query_as::<_, Bounty>(
            "SELECT * FROM bounties WHERE repository_id = $1 AND status = 'active' ORDER BY issue_number",
        )
        .bind(repository_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bounties)
    }

    async fn has_open_bounty(
        &self,
        repository_id: i64,
        issue_number: i64,
    ) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM bounties
                WHERE repository_id = $1
                AND issue_number = $2
                AND status IN ('active', 'pending_payout')
            )
            "#,
        )
        .bind(repository_id)
        .bind(issue_number)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
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

        let result = sqlx::query(
            "UPDATE bounties SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
        )
        .bind(to)
        .bind(id)
        .bind(from)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl PayoutLedger for PgStore {
    async fn insert_payout(&self, payout: Payout) -> Result<Payout, StoreError> {
        let inserted = sqlx::query_as::<_, Payout>(
            r#"
            INSERT INTO payouts (
                id, bounty_id, repository_id, repository_name, issue_number,
                pull_request_id, pull_request_number, contributor_id, contributor_login,
                amount, currency, status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(payout.id)
        .bind(payout.bounty_id)
        .bind(payout.repository_id)
        .bind(&payout.repository_name)
        .bind(payout.issue_number)
        .bind(payout.pull_request_id)
        .bind(payout.pull_request_number)
        .bind(payout.contributor_id)
        .bind(&payout.contributor_login)
        .bind(&payout.amount)
        .bind(&payout.currency)
        .bind(payout.status)
        .bind(payout.created_at)
        .bind(payout.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(inserted)
    }

    async fn get_payout(&self, id: Uuid) -> Result<Payout, StoreError> {
        sqlx::query_as::<_, Payout>("SELECT * FROM payouts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
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

        let result = sqlx::query(
            "UPDATE payouts SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
        )
        .bind(to)
        .bind(id)
        .bind(from)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl TransactionLog for PgStore {
    async fn insert_transaction(&self, tx: Transaction) -> Result<Transaction, StoreError> {
        let inserted = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (
                id, payout_id, provider_transaction_id, amount, fee, currency, status, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(tx.id)
        .bind(tx.payout_id)
        .bind(&tx.provider_transaction_id)
        .bind(&tx.amount)
        .bind(&tx.fee)
        .bind(&tx.currency)
        .bind(tx.status)
        .bind(tx.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(inserted)
    }
}

#[async_trait]
impl FundingStore for PgStore {
    async fn insert_funding_source(
        &self,
        source: FundingSource,
    ) -> Result<FundingSource, StoreError> {
        let inserted = sqlx::query_as::<_, FundingSource>(
            r#"
            INSERT INTO funding_sources (
                id, owner_login, provider_account_id, currency, reserved, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(source.id)
        .bind(&source.owner_login)
        .bind(&source.provider_account_id)
        .bind(&source.currency)
        .bind(&source.reserved)
        .bind(source.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(inserted)
    }

    async fn funding_source_for(
        &self,
        owner_login: &str,
    ) -> Result<Option<FundingSource>, StoreError> {
        let source = sqlx::query_as::<_, FundingSource>(
            "SELECT * FROM funding_sources WHERE owner_login = $1",
        )
        .bind(owner_login)
        .fetch_optional(&self.pool)
        .await?;

        Ok(source)
    }

    async fn try_reserve(
        &self,
        source_id: Uuid,
        amount: &BigDecimal,
        available: &BigDecimal,
    ) -> Result<bool, StoreError> {
        // Single conditional update: the balance check and the decrement are
        // one statement, so two concurrent claims cannot both pass.
        let result = sqlx::query(
            r#"
            UPDATE funding_sources
            SET reserved = reserved + $2
            WHERE id = $1 AND $3 - reserved >= $2
            "#,
        )
        .bind(source_id)
        .bind(amount)
        .bind(available)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_reservation(
        &self,
        source_id: Uuid,
        amount: &BigDecimal,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE funding_sources SET reserved = GREATEST(reserved - $2, 0) WHERE id = $1",
        )
        .bind(source_id)
        .bind(amount)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl InstallationStore for PgStore {
    async fn upsert_installation(&self, installation: Installation) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO github_installations (
                installation_id, account_login, repository_selection, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (installation_id) DO UPDATE
            SET account_login = EXCLUDED.account_login,
                repository_selection = EXCLUDED.repository_selection,
                updated_at = NOW()
            "#,
        )
        .bind(installation.installation_id)
        .bind(&installation.account_login)
        .bind(&installation.repository_selection)
        .bind(installation.created_at)
        .bind(installation.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn deactivate_installation(&self, installation_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE github_installations
            SET repository_selection = 'inactive', updated_at = NOW()
            WHERE installation_id = $1
            "#,
        )
        .bind(installation_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "installation {installation_id}"
            )));
        }
        Ok(())
    }

    async fn upsert_repository(&self, repository: EnabledRepository) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO enabled_repositories (
                repository_id, full_name, installation_id, status, created_at
            ) VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (repository_id) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                installation_id = EXCLUDED.installation_id,
                status = EXCLUDED.status
            "#,
        )
        .bind(repository.repository_id)
        .bind(&repository.full_name)
        .bind(repository.installation_id)
        .bind(&repository.status)
        .bind(repository.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn deactivate_repository(&self, repository_id: i64) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE enabled_repositories SET status = 'inactive' WHERE repository_id = $1")
                .bind(repository_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("repository {repository_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn table_count(&self, table: ProtectedTable) -> Result<i64, StoreError> {
        // Table names come from a closed enum, never from input.
        let sql = match table {
            ProtectedTable::Bounties => "SELECT COUNT(*) FROM bounties",
            ProtectedTable::Payouts => "SELECT COUNT(*) FROM payouts",
            ProtectedTable::Transactions => "SELECT COUNT(*) FROM transactions",
            ProtectedTable::EnabledRepositories => "SELECT COUNT(*) FROM enabled_repositories",
            ProtectedTable::GithubInstallations => "SELECT COUNT(*) FROM github_installations",
        };

        let count: i64 = sqlx::query_scalar(sql).fetch_one(&self.pool).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Complexity;

    async fn setup_pool() -> PgPool {
        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
        let pool = PgPool::connect(&database_url)
            .await
            .expect("failed to connect to test database");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("failed to run migrations");
        pool
    }

    #[tokio::test]
    #[ignore]
    async fn insert_and_fetch_bounty() {
        let store = PgStore::new(setup_pool().await);
        let bounty = Bounty::new(
            rand_repo_id(),
            "acme/widget".to_string(),
            42,
            BigDecimal::from(100),
            "USD".to_string(),
            Complexity::Medium,
            "maintainer".to_string(),
        );

        let inserted = store.insert_bounty(bounty.clone()).await.unwrap();
        let fetched = store.get_bounty(inserted.id).await.unwrap();

        assert_eq!(fetched.issue_number, 42);
        assert_eq!(fetched.status, BountyStatus::Active);
    }

    #[tokio::test]
    #[ignore]
    async fn unique_index_rejects_duplicate_payout() {
        let store = PgStore::new(setup_pool().await);
        let bounty = store
            .insert_bounty(Bounty::new(
                rand_repo_id(),
                "acme/widget".to_string(),
                7,
                BigDecimal::from(50),
                "USD".to_string(),
                Complexity::Low,
                "maintainer".to_string(),
            ))
            .await
            .unwrap();

        let payout = Payout::for_merged_pull_request(&bounty, 900, 12, 55, "alice".to_string());
        store.insert_payout(payout.clone()).await.unwrap();

        let duplicate = Payout::for_merged_pull_request(&bounty, 900, 12, 55, "alice".to_string());
        let result = store.insert_payout(duplicate).await;
        assert!(matches!(result, Err(StoreError::Duplicate(_))));
    }

    fn rand_repo_id() -> i64 {
        // Unique-ish per test run so reruns do not trip the open-bounty index.
        chrono::Utc::now().timestamp_micros()
    }
}
