use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::db::models::Payout;
use crate::error::AppError;
use crate::services::claim::{ClaimProcessor, ClaimRequest};
use crate::AppState;

pub async fn submit_claim(
    State(state): State<AppState>,
    Json(request): Json<ClaimRequest>,
) -> Result<impl IntoResponse, AppError> {
    let processor = ClaimProcessor::new(state.store.clone(), state.payments.clone());
    let receipt = processor.process(&request).await?;
    Ok(Json(receipt))
}

pub async fn get_payout(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Payout>, AppError> {
    let payout = state.store.get_payout(id).await?;
    Ok(Json(payout))
}
