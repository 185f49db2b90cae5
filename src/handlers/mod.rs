pub mod bounties;
pub mod claims;
pub mod funding;
pub mod protection;
pub mod webhook;

use axum::Json;
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
