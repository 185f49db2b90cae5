use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;

use crate::db::models::FundingSource;
use crate::error::AppError;
use crate::validation::validate_required;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ConnectFundingSourceRequest {
    pub owner_login: String,
    /// Account id at the payment provider; balance and transfers run
    /// against it.
    pub provider_account_id: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Connects a maintainer's payment-provider account as the funding source
/// for their bounties. One source per owner login.
pub async fn connect_funding_source(
    State(state): State<AppState>,
    Json(request): Json<ConnectFundingSourceRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_required("owner_login", &request.owner_login)?;
    validate_required("provider_account_id", &request.provider_account_id)?;

    if state
        .store
        .funding_source_for(&request.owner_login)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(format!(
            "a funding source is already connected for {}",
            request.owner_login
        )));
    }

    let source = state
        .store
        .insert_funding_source(FundingSource::connect(
            request.owner_login,
            request.provider_account_id,
            request.currency,
        ))
        .await?;

    tracing::info!(
        source_id = %source.id,
        owner = %source.owner_login,
        "funding source connected"
    );
    Ok((StatusCode::CREATED, Json(source)))
}
