use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::routes::authorized;
use crate::AppState;

/// Runs one full sync and reports its counts. Unauthorized calls return 401
/// with no side effects; an incomplete config aborts before any write.
pub async fn run_sync(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers, &state.auth_key) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "ok": false }))).into_response();
    }
    if let Err(e) = state.config.validate() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "error": e.to_string() })),
        )
            .into_response();
    }

    match state.runner.run().await {
        Ok(stats) => Json(json!({
            "ok": true,
            "fetched": stats.fetched,
            "scored": stats.scored,
            "featured": stats.featured,
            "ranked": stats.ranked,
        }))
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "error": e.to_string() })),
        )
            .into_response(),
    }
}
