use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::db::models::{Bounty, Complexity};
use crate::error::AppError;
use crate::protection::{ProtectedTable, RemovalIntent};
use crate::scoring::{ComplexityScorer, IssueSignals, LabelScorer, TextHeuristicScorer};
use crate::validation::{validate_non_negative_amount, validate_required};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBountyRequest {
    pub repository_id: i64,
    pub repository_full_name: String,
    pub issue_number: i64,
    pub amount: Option<BigDecimal>,
    pub currency: Option<String>,
    pub complexity: Option<Complexity>,
    pub created_by: String,
    #[serde(default)]
    pub issue_title: String,
    #[serde(default)]
    pub issue_body: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

pub async fn create_bounty(
    State(state): State<AppState>,
    Json(request): Json<CreateBountyRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_required("repository_full_name", &request.repository_full_name)?;
    validate_required("created_by", &request.created_by)?;
    if request.issue_number < 1 {
        return Err(AppError::Validation(
            "issue_number: must be a positive integer".to_string(),
        ));
    }

    // When the maintainer leaves amount or complexity unset, a scoring
    // strategy fills the gap: labels when we have them, text heuristics
    // otherwise.
    let (amount, complexity) = match (request.amount, request.complexity) {
        (Some(amount), Some(complexity)) => (amount, complexity),
        (amount, complexity) => {
            let signals = IssueSignals {
                title: request.issue_title.clone(),
                body: request.issue_body.clone(),
                labels: request.labels.clone(),
                comments: 0,
            };
            let suggested = if signals.labels.is_empty() {
                TextHeuristicScorer.suggest(&signals)
            } else {
                LabelScorer.suggest(&signals)
            };
            (
                amount.unwrap_or(suggested.amount),
                complexity.unwrap_or(suggested.complexity),
            )
        }
    };
    validate_non_negative_amount(&amount)?;

    if state
        .store
        .has_open_bounty(request.repository_id, request.issue_number)
        .await?
    {
        return Err(AppError::Conflict(format!(
            "an open bounty already exists for {}#{}",
            request.repository_full_name, request.issue_number
        )));
    }

    let bounty = Bounty::new(
        request.repository_id,
        request.repository_full_name,
        request.issue_number,
        amount,
        request.currency.unwrap_or_else(|| "USD".to_string()),
        complexity,
        request.created_by,
    );
    let bounty = state.store.insert_bounty(bounty).await?;

    tracing::info!(
        bounty_id = %bounty.id,
        repository = %bounty.repository_full_name,
        issue_number = bounty.issue_number,
        amount = %bounty.amount,
        "bounty created"
    );

    Ok((StatusCode::CREATED, Json(bounty)))
}

#[derive(Debug, Deserialize)]
pub struct BountyQuery {
    pub repository_id: i64,
}

pub async fn list_active_bounties(
    State(state): State<AppState>,
    Query(query): Query<BountyQuery>,
) -> Result<Json<Vec<Bounty>>, AppError> {
    let bounties = state.store.find_active_bounties(query.repository_id).await?;
    Ok(Json(bounties))
}

/// DELETE is registered so delete intents land on the gatekeeper, which
/// rejects them. There is no code path that removes a bounty row.
pub async fn delete_bounty(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    Err(state.gatekeeper.block_removal(
        ProtectedTable::Bounties,
        RemovalIntent::Delete,
        &format!("api:bounty:{id}"),
    ))
}

pub async fn deactivate_bounty(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.gatekeeper.soft_delete_bounty(id, "api").await?;
    Ok(Json(json!({ "bounty_id": id, "status": "inactive" })))
}
