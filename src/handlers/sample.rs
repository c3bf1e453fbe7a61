// handlers/sample.rs - ping endpoints for checking the auth pipeline

use serde_json::{json, Value};

use crate::auth::jwt::{CLAIM_NAME, CLAIM_ROLE, CLAIM_USERID};
use crate::middleware::{ApiResponse, HandlerResult, RequestClaims};

/// GET /sample/ping - Unauthenticated ping
pub async fn ping() -> HandlerResult<Value> {
    Ok(ApiResponse::success(json!({ "result": "pong" })))
}

/// GET /sampleprotected/ping - Ping for any authenticated caller, echoing their claims
pub async fn protected_ping(claims: RequestClaims) -> HandlerResult<Value> {
    Ok(ApiResponse::success(json!({
        "result": "pong",
        "role": claims.get_claim(CLAIM_ROLE),
        "userid": claims.get_claim(CLAIM_USERID),
        "name": claims.get_claim(CLAIM_NAME),
    })))
}

/// GET /sampleprotected/pingadm - Ping restricted to admins
pub async fn admin_ping(claims: RequestClaims) -> HandlerResult<Value> {
    Ok(ApiResponse::success(json!({
        "result": "pongadm",
        "name": claims.get_claim(CLAIM_NAME),
    })))
}
