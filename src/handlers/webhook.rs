//! GitHub webhook ingress.
//!
//! Signature verification runs against the raw body before anything is
//! parsed or any state is touched; a bad signature never reaches the store.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;

use crate::db::models::{EnabledRepository, Installation};
use crate::error::AppError;
use crate::github::InstallationEvent;
use crate::github::PullRequestEvent;
use crate::services::merge_handler::MergeEventHandler;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Verifies `sha256=<hex>` HMAC signatures over the raw request body.
pub fn verify_signature(secret: &str, body: &[u8], header_value: &str) -> Result<(), AppError> {
    let hex_digest = header_value
        .strip_prefix("sha256=")
        .ok_or_else(|| AppError::Unauthorized("malformed signature header".to_string()))?;
    let expected = hex::decode(hex_digest)
        .map_err(|_| AppError::Unauthorized("malformed signature header".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("webhook secret unusable: {e}")))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| AppError::Unauthorized("webhook signature mismatch".to_string()))
}

pub async fn github_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    if let Some(secret) = &state.settings.webhook_secret {
        let provided = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing webhook signature".to_string()))?;
        verify_signature(secret, &body, provided)?;
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("malformed webhook payload: {e}")))?;

    if payload.get("pull_request").is_some() {
        let event: PullRequestEvent = serde_json::from_value(payload)
            .map_err(|e| AppError::Validation(format!("malformed pull request event: {e}")))?;

        let handler = MergeEventHandler::new(
            state.store.clone(),
            state.github.clone(),
            state.settings.claim_base_url.clone(),
            state.settings.bounty_pace,
        );
        let outcome = handler.handle(&event).await?;
        let body = serde_json::to_value(&outcome)
            .map_err(|e| AppError::Internal(format!("outcome serialization: {e}")))?;
        return Ok(Json(body));
    }

    if payload.get("installation").is_some() {
        return handle_installation_event(&state, payload).await;
    }

    tracing::debug!("webhook event without pull_request or installation; ignored");
    Ok(Json(json!({ "outcome": "ignored" })))
}

async fn handle_installation_event(
    state: &AppState,
    payload: Value,
) -> Result<Json<Value>, AppError> {
    let event: InstallationEvent = serde_json::from_value(payload)
        .map_err(|e| AppError::Validation(format!("malformed installation event: {e}")))?;
    let account = event.installation.account.login.clone();

    match event.action.as_str() {
        "created" => {
            let now = Utc::now();
            state
                .store
                .upsert_installation(Installation {
                    installation_id: event.installation.id,
                    account_login: account.clone(),
                    repository_selection: event
                        .installation
                        .repository_selection
                        .unwrap_or_else(|| "selected".to_string()),
                    created_at: now,
                    updated_at: now,
                })
                .await?;

            for repo in &event.repositories {
                state
                    .store
                    .upsert_repository(EnabledRepository {
                        repository_id: repo.id,
                        full_name: repo.full_name.clone(),
                        installation_id: event.installation.id,
                        status: "active".to_string(),
                        created_at: now,
                    })
                    .await?;
            }

            tracing::info!(
                installation_id = event.installation.id,
                account = %account,
                repositories = event.repositories.len(),
                "installation registered"
            );
            Ok(Json(json!({ "outcome": "installation_created" })))
        }
        "deleted" => {
            // Uninstall is a soft delete: install state and repository rows
            // are flipped inactive through the gatekeeper, never removed.
            state
                .gatekeeper
                .deactivate_installation(event.installation.id, &account)
                .await?;

            for repo in &event.repositories {
                match state
                    .gatekeeper
                    .deactivate_repository(repo.id, &account)
                    .await
                {
                    Ok(()) | Err(AppError::NotFound(_)) => {}
                    Err(err) => return Err(err),
                }
            }

            Ok(Json(json!({ "outcome": "installation_deactivated" })))
        }
        other => {
            tracing::debug!(action = other, "unhandled installation action");
            Ok(Json(json!({ "outcome": "ignored" })))
        }
    }
}
