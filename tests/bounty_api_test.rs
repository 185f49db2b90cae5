mod common;

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use bigdecimal::BigDecimal;

use bountyflow::db::memory::MemoryStore;
use bountyflow::db::models::Complexity;
use bountyflow::db::store::BountyStore;
use bountyflow::error::AppError;
use bountyflow::handlers::bounties::{create_bounty, delete_bounty, CreateBountyRequest};
use bountyflow::AppState;

use common::{test_state, MockGithub, MockPayments};

fn state(store: Arc<MemoryStore>) -> AppState {
    test_state(
        store,
        Arc::new(MockGithub::new()),
        Arc::new(MockPayments::with_balance(BigDecimal::from(0))),
        None,
    )
}

fn request(
    amount: Option<BigDecimal>,
    complexity: Option<Complexity>,
    labels: &[&str],
) -> CreateBountyRequest {
    CreateBountyRequest {
        repository_id: 1,
        repository_full_name: "acme/widget".to_string(),
        issue_number: 42,
        amount,
        currency: None,
        complexity,
        created_by: "maintainer".to_string(),
        issue_title: "Crash on empty config".to_string(),
        issue_body: "panic when the config file is empty".to_string(),
        labels: labels.iter().map(|s| s.to_string()).collect(),
    }
}

#[tokio::test]
async fn unpriced_bounty_gets_a_label_based_suggestion() {
    let store = Arc::new(MemoryStore::new());
    let result = create_bounty(
        State(state(store.clone())),
        Json(request(None, None, &["bug"])),
    )
    .await;
    assert!(result.is_ok());

    let bounties = store.find_active_bounties(1).await.unwrap();
    assert_eq!(bounties.len(), 1);
    assert_eq!(bounties[0].amount, BigDecimal::from(200));
    assert_eq!(bounties[0].complexity, Complexity::High);
    assert_eq!(bounties[0].currency, "USD");
}

#[tokio::test]
async fn explicit_amount_is_kept_while_complexity_is_suggested() {
    let store = Arc::new(MemoryStore::new());
    let result = create_bounty(
        State(state(store.clone())),
        Json(request(Some(BigDecimal::from(150)), None, &[])),
    )
    .await;
    assert!(result.is_ok());

    let bounties = store.find_active_bounties(1).await.unwrap();
    assert_eq!(bounties[0].amount, BigDecimal::from(150));
    // Text heuristics kick in without labels; "crash"/"panic" reads as high.
    assert_eq!(bounties[0].complexity, Complexity::High);
}

#[tokio::test]
async fn explicit_values_bypass_scoring() {
    let store = Arc::new(MemoryStore::new());
    let result = create_bounty(
        State(state(store.clone())),
        Json(request(
            Some(BigDecimal::from(42)),
            Some(Complexity::Low),
            &["security"],
        )),
    )
    .await;
    assert!(result.is_ok());

    let bounties = store.find_active_bounties(1).await.unwrap();
    assert_eq!(bounties[0].amount, BigDecimal::from(42));
    assert_eq!(bounties[0].complexity, Complexity::Low);
}

#[tokio::test]
async fn second_open_bounty_for_the_same_issue_is_a_conflict() {
    let store = Arc::new(MemoryStore::new());
    let s = state(store.clone());

    create_bounty(State(s.clone()), Json(request(None, None, &["bug"])))
        .await
        .map(|_| ())
        .expect("first bounty");
    let second = create_bounty(State(s), Json(request(None, None, &["bug"]))).await;

    assert!(matches!(second, Err(AppError::Conflict(_))));
    assert_eq!(store.find_active_bounties(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn negative_amount_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let result = create_bounty(
        State(state(store.clone())),
        Json(request(Some(BigDecimal::from(-5)), None, &[])),
    )
    .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(store.find_active_bounties(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_endpoint_is_always_blocked() {
    let store = Arc::new(MemoryStore::new());
    let s = state(store.clone());
    create_bounty(State(s.clone()), Json(request(None, None, &["bug"])))
        .await
        .map(|_| ())
        .expect("bounty");
    let id = store.find_active_bounties(1).await.unwrap()[0].id;

    let result = delete_bounty(State(s), Path(id)).await;

    assert!(matches!(result, Err(AppError::ProtectionViolation(_))));
    assert_eq!(store.find_active_bounties(1).await.unwrap().len(), 1);
}
