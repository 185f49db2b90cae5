pub mod config;
pub mod db;
pub mod error;
pub mod github;
pub mod handlers;
pub mod payments;
pub mod protection;
pub mod refs;
pub mod scoring;
pub mod services;
pub mod validation;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::db::store::Store;
use crate::github::GithubApi;
use crate::payments::PaymentProvider;
use crate::protection::ProtectionGatekeeper;
use crate::services::merge_handler::DEFAULT_BOUNTY_PACE;

pub struct Settings {
    /// Shared secret for webhook HMAC verification; verification is skipped
    /// when unset (local development only).
    pub webhook_secret: Option<String>,
    /// Base URL the claim links in contributor notifications point at.
    pub claim_base_url: String,
    /// Pause between bounty iterations within one merge event.
    pub bounty_pace: Duration,
}

impl Settings {
    pub fn new(webhook_secret: Option<String>, claim_base_url: String) -> Self {
        Self {
            webhook_secret,
            claim_base_url,
            bounty_pace: DEFAULT_BOUNTY_PACE,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub github: Arc<dyn GithubApi>,
    pub payments: Arc<dyn PaymentProvider>,
    pub gatekeeper: Arc<ProtectionGatekeeper>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        github: Arc<dyn GithubApi>,
        payments: Arc<dyn PaymentProvider>,
        settings: Settings,
    ) -> Self {
        let gatekeeper = Arc::new(ProtectionGatekeeper::new(store.clone()));
        Self {
            store,
            github,
            payments,
            gatekeeper,
            settings: Arc::new(settings),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/webhooks/github", post(handlers::webhook::github_webhook))
        .route(
            "/bounties",
            post(handlers::bounties::create_bounty).get(handlers::bounties::list_active_bounties),
        )
        .route("/bounties/:id", delete(handlers::bounties::delete_bounty))
        .route(
            "/bounties/:id/deactivate",
            post(handlers::bounties::deactivate_bounty),
        )
        .route(
            "/funding-sources",
            post(handlers::funding::connect_funding_source),
        )
        .route("/claims", post(handlers::claims::submit_claim))
        .route("/payouts/:id", get(handlers::claims::get_payout))
        .route("/protection/audit", get(handlers::protection::audit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
