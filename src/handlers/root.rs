// handlers/root.rs - service identity and liveness

use axum::extract::State;
use serde_json::{json, Value};

use crate::config::keys;
use crate::middleware::{ApiResponse, HandlerResult};
use crate::state::AppState;

/// GET / - Service name, version and deployment tags
pub async fn root(State(state): State<AppState>) -> HandlerResult<Value> {
    let container = state.container();
    Ok(ApiResponse::success(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": container.environment(),
        "tag_version": container.get_str(keys::TAG_VERSION)?,
        "tag_commit": container.get_str(keys::TAG_COMMIT)?,
        "build": container.get_value(keys::BUILD_INFO)?,
    })))
}

/// GET /health - Liveness probe
pub async fn health() -> HandlerResult<Value> {
    Ok(ApiResponse::success(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}
