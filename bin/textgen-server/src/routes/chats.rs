//! Chat history as JSON.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::entities::ChatStore;
use crate::error::ServerError;
use crate::schemas::chat::{ChatEntry, ChatListQuery};
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 500;

#[derive(OpenApi)]
#[openapi(paths(list_chats), components(schemas(ChatEntry)))]
pub struct ChatsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/chats", get(list_chats))
}

/// List stored chats, newest first.
#[utoipa::path(
    get,
    path = "/api/chats",
    tag = "chats",
    params(ChatListQuery),
    responses(
        (status = 200, description = "Chat history", body = Vec<ChatEntry>),
        (status = 500, description = "Database error"),
    )
)]
pub async fn list_chats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChatListQuery>,
) -> Result<Json<Vec<ChatEntry>>, ServerError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let records = state.store.list_chats(limit).await?;
    Ok(Json(records.into_iter().map(ChatEntry::from).collect()))
}

#[cfg(test)]
mod test {
    use axum::http::StatusCode;
    use textgen_core::ChatRecord;

    use crate::entities::ChatStore;
    use crate::routes::test_support::{TestApp, request_json};

    #[tokio::test]
    async fn lists_newest_first_with_limit() {
        let app = TestApp::replying("unused").await;
        for i in 0..3 {
            let mut record = ChatRecord::new(format!("q{i}"), format!("a{i}"));
            record.created_at += chrono::Duration::seconds(i);
            app.store.insert_chat(&record).await.unwrap();
        }

        let (status, body) = request_json(&app.router, "GET", "/api/chats?limit=2", None).await;
        assert_eq!(status, StatusCode::OK);

        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["prompt"], "q2");
        assert_eq!(entries[1]["prompt"], "q1");
        assert!(entries[0]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn empty_history_is_an_empty_list() {
        let app = TestApp::replying("unused").await;
        let (status, body) = request_json(&app.router, "GET", "/api/chats", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));
    }
}
