use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use textgen_core::ChatRecord;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// One stored prompt/response pair.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatEntry {
    pub id: Uuid,
    pub prompt: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

impl From<ChatRecord> for ChatEntry {
    fn from(record: ChatRecord) -> Self {
        Self {
            id: record.id,
            prompt: record.prompt,
            response: record.response,
            timestamp: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ChatListQuery {
    /// Maximum number of records, newest first (default 50, max 500).
    pub limit: Option<u32>,
}
