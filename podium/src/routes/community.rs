use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::AppState;

pub async fn featured(State(state): State<AppState>) -> impl IntoResponse {
    let list = match state.store.featured() {
        Ok(list) => list.unwrap_or_default(),
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };
    let updated_at = state.store.featured_updated_at().unwrap_or(None);
    Json(json!({ "comments": list, "updated_at": updated_at })).into_response()
}

pub async fn leaderboard(State(state): State<AppState>) -> impl IntoResponse {
    let list = match state.store.leaderboard() {
        Ok(list) => list.unwrap_or_default(),
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };
    let updated_at = state.store.leaderboard_updated_at().unwrap_or(None);
    Json(json!({ "entries": list, "updated_at": updated_at })).into_response()
}
