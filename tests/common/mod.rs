#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;

use bountyflow::db::memory::MemoryStore;
use bountyflow::db::models::{Bounty, Complexity, FundingSource};
use bountyflow::db::store::Store;
use bountyflow::github::{
    GithubApi, GithubError, GithubUser, IssueRef, PullRequest, PullRequestEvent, Repository,
};
use bountyflow::payments::{PaymentError, PaymentProvider, ProviderTransfer, TransferRequest};
use bountyflow::{AppState, Settings};

pub struct MockGithub {
    issues: Mutex<HashMap<(String, i64), IssueRef>>,
    comments: Mutex<Vec<(String, i64, String)>>,
    fail_comments: AtomicBool,
}

impl MockGithub {
    pub fn new() -> Self {
        Self {
            issues: Mutex::new(HashMap::new()),
            comments: Mutex::new(Vec::new()),
            fail_comments: AtomicBool::new(false),
        }
    }

    pub fn with_issue(self, repo: &str, issue: IssueRef) -> Self {
        self.issues
            .lock()
            .unwrap()
            .insert((repo.to_string(), issue.number), issue);
        self
    }

    pub fn fail_comments(self) -> Self {
        self.fail_comments.store(true, Ordering::SeqCst);
        self
    }

    pub fn comments(&self) -> Vec<(String, i64, String)> {
        self.comments.lock().unwrap().clone()
    }
}

#[async_trait]
impl GithubApi for MockGithub {
    async fn get_issue(&self, repo_full_name: &str, number: i64) -> Result<IssueRef, GithubError> {
        self.issues
            .lock()
            .unwrap()
            .get(&(repo_full_name.to_string(), number))
            .cloned()
            .ok_or(GithubError::NotFound)
    }

    async fn post_comment(
        &self,
        repo_full_name: &str,
        issue_number: i64,
        body: &str,
    ) -> Result<(), GithubError> {
        if self.fail_comments.load(Ordering::SeqCst) {
            return Err(GithubError::RateLimited);
        }
        self.comments.lock().unwrap().push((
            repo_full_name.to_string(),
            issue_number,
            body.to_string(),
        ));
        Ok(())
    }
}

pub struct MockPayments {
    balance: Mutex<BigDecimal>,
    transfers: Mutex<Vec<TransferRequest>>,
    balance_calls: AtomicUsize,
    fail_transfers: AtomicBool,
    transfer_delay: Mutex<Duration>,
    next_id: AtomicUsize,
}

impl MockPayments {
    pub fn with_balance(balance: BigDecimal) -> Self {
        Self {
            balance: Mutex::new(balance),
            transfers: Mutex::new(Vec::new()),
            balance_calls: AtomicUsize::new(0),
            fail_transfers: AtomicBool::new(false),
            transfer_delay: Mutex::new(Duration::ZERO),
            next_id: AtomicUsize::new(1),
        }
    }

    pub fn fail_transfers(self) -> Self {
        self.fail_transfers.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_transfer_delay(self, delay: Duration) -> Self {
        *self.transfer_delay.lock().unwrap() = delay;
        self
    }

    pub fn transfers(&self) -> Vec<TransferRequest> {
        self.transfers.lock().unwrap().clone()
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProvider for MockPayments {
    async fn available_balance(
        &self,
        _account: &str,
        _currency: &str,
    ) -> Result<BigDecimal, PaymentError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.balance.lock().unwrap().clone())
    }

    async fn execute_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<ProviderTransfer, PaymentError> {
        let delay = *self.transfer_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(PaymentError::Provider {
                status: 500,
                message: "provider unavailable".to_string(),
            });
        }

        self.transfers.lock().unwrap().push(request.clone());
        {
            let mut balance = self.balance.lock().unwrap();
            *balance = &*balance - &request.amount;
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(ProviderTransfer {
            id: format!("prov-tx-{id}"),
            status: "completed".to_string(),
        })
    }
}

pub fn issue(number: i64) -> IssueRef {
    IssueRef {
        number,
        title: format!("Issue {number}"),
        state: "open".to_string(),
        is_pull_request: false,
        labels: Vec::new(),
        comments: 0,
    }
}

pub fn pull_request_issue(number: i64) -> IssueRef {
    IssueRef {
        is_pull_request: true,
        ..issue(number)
    }
}

pub fn merge_event(repo_id: i64, full_name: &str, body: &str) -> PullRequestEvent {
    PullRequestEvent {
        action: "closed".to_string(),
        pull_request: PullRequest {
            id: 900,
            number: 7,
            title: "Fix the widget".to_string(),
            body: Some(body.to_string()),
            merged: true,
            user: GithubUser {
                id: 55,
                login: "alice".to_string(),
            },
        },
        repository: Repository {
            id: repo_id,
            name: full_name.split('/').next_back().unwrap_or(full_name).to_string(),
            full_name: full_name.to_string(),
            private: false,
            stargazers_count: 12,
        },
    }
}

pub fn bounty(repo_id: i64, full_name: &str, issue_number: i64, amount: i64) -> Bounty {
    Bounty::new(
        repo_id,
        full_name.to_string(),
        issue_number,
        BigDecimal::from(amount),
        "USD".to_string(),
        Complexity::Medium,
        "maintainer".to_string(),
    )
}

pub fn funding_source(owner: &str) -> FundingSource {
    FundingSource::connect(owner.to_string(), "acct-1".to_string(), "USD".to_string())
}

pub fn test_state(
    store: Arc<MemoryStore>,
    github: Arc<MockGithub>,
    payments: Arc<MockPayments>,
    webhook_secret: Option<&str>,
) -> AppState {
    let mut settings = Settings::new(
        webhook_secret.map(String::from),
        "https://claims.test".to_string(),
    );
    settings.bounty_pace = Duration::ZERO;
    AppState::new(store as Arc<dyn Store>, github, payments, settings)
}
