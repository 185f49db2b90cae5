use axum::{extract::State, Json};

use crate::error::AppError;
use crate::protection::ProtectionAudit;
use crate::AppState;

/// Row counts per protected table plus the active policy list, so an
/// operator can verify that no records disappeared.
pub async fn audit(State(state): State<AppState>) -> Result<Json<ProtectionAudit>, AppError> {
    let audit = state.gatekeeper.audit().await?;
    Ok(Json(audit))
}
