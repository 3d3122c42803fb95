use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;

use crate::routes::authorized;
use crate::AppState;

#[derive(Deserialize)]
pub struct HideRequest {
    // Optional at the extractor so a missing id is our 400, not a 422.
    #[serde(default, alias = "commentId")]
    pub comment_id: Option<String>,
}

/// Out-of-band moderation action: the id goes into the hidden set so no
/// future run rescores or surfaces it, and any stored record flips to
/// hidden immediately.
pub async fn hide_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<HideRequest>,
) -> impl IntoResponse {
    if !authorized(&headers, &state.auth_key) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "ok": false }))).into_response();
    }

    let comment_id = payload.comment_id.as_deref().unwrap_or("").trim();
    if comment_id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "error": "comment_id required" })),
        )
            .into_response();
    }

    let result = (|| -> anyhow::Result<()> {
        state.store.add_hidden_id(comment_id)?;
        if let Some(mut record) = state.store.comment(comment_id)? {
            record.status = sift::core::comments::CommentStatus::Hidden;
            state.store.set_comment(&record)?;
        }
        state.store.flush()?;
        Ok(())
    })();

    match result {
        Ok(()) => Json(json!({ "ok": true })).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "error": e.to_string() })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hide_request_tolerates_a_missing_id() {
        let req: HideRequest = serde_json::from_str("{}").unwrap();
        assert!(req.comment_id.is_none());
    }

    #[test]
    fn hide_request_accepts_both_id_spellings() {
        let req: HideRequest = serde_json::from_str(r#"{"commentId":"c1"}"#).unwrap();
        assert_eq!(req.comment_id.as_deref(), Some("c1"));
        let req: HideRequest = serde_json::from_str(r#"{"comment_id":"c2"}"#).unwrap();
        assert_eq!(req.comment_id.as_deref(), Some("c2"));
    }
}
