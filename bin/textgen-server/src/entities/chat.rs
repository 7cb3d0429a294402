use std::future::Future;

use textgen_core::{BoxError, ChatRecord, ChatRecorder};
use uuid::Uuid;

use crate::entities::{SqliteStore, format_timestamp, parse_timestamp};

pub trait ChatStore: Send + Sync + 'static {
    fn insert_chat(
        &self,
        record: &ChatRecord,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Newest first.
    fn list_chats(
        &self,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<ChatRecord>, sqlx::Error>> + Send;
}

impl ChatStore for SqliteStore {
    async fn insert_chat(&self, record: &ChatRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO chat_records (id, prompt, response, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(record.id.to_string())
        .bind(&record.prompt)
        .bind(&record.response)
        .bind(format_timestamp(record.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_chats(&self, limit: u32) -> Result<Vec<ChatRecord>, sqlx::Error> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, prompt, response, created_at FROM chat_records \
             ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, prompt, response, created_at)| ChatRecord {
                id: id.parse().unwrap_or_else(|e: uuid::Error| {
                    tracing::warn!(raw = %id, error = %e, "failed to parse chat id; using nil");
                    Uuid::nil()
                }),
                prompt,
                response,
                created_at: parse_timestamp(&created_at, "chat_records.created_at"),
            })
            .collect())
    }
}

impl ChatRecorder for SqliteStore {
    async fn record_chat(&self, record: ChatRecord) -> Result<(), BoxError> {
        Ok(self.insert_chat(&record).await?)
    }
}

#[cfg(test)]
mod test {
    use chrono::{Duration, Utc};

    use super::*;

    #[tokio::test]
    async fn chats_are_listed_newest_first() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        let now = Utc::now();

        for (i, prompt) in ["old", "middle", "new"].into_iter().enumerate() {
            let mut record = ChatRecord::new(prompt, format!("answer {i}"));
            record.created_at = now + Duration::seconds(i as i64);
            store.insert_chat(&record).await.unwrap();
        }

        let chats = store.list_chats(10).await.unwrap();
        let prompts: Vec<_> = chats.iter().map(|c| c.prompt.as_str()).collect();
        assert_eq!(prompts, ["new", "middle", "old"]);

        assert_eq!(store.list_chats(2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn recorder_persists_the_record_unchanged() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        let record = ChatRecord::new("Explain gravity.", "Things fall.");
        store.record_chat(record.clone()).await.unwrap();

        let stored = store.list_chats(1).await.unwrap().remove(0);
        assert_eq!(stored.id, record.id);
        assert_eq!(stored.response, "Things fall.");
        // Stored with microsecond precision.
        assert_eq!(
            stored.created_at.timestamp_micros(),
            record.created_at.timestamp_micros()
        );
    }
}
