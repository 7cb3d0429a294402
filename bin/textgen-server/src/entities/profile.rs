use std::future::Future;

use chrono::Utc;
use textgen_core::{BoxError, GenerationProfile, ProfileLookup, Role};

use crate::entities::{SqliteStore, format_timestamp};

pub trait ProfileStore: Send + Sync + 'static {
    fn get_profile(
        &self,
        identifier: &str,
    ) -> impl Future<Output = Result<Option<GenerationProfile>, sqlx::Error>> + Send;

    /// The earliest-inserted profile for `role`.
    fn find_profile_by_role(
        &self,
        role: Role,
    ) -> impl Future<Output = Result<Option<GenerationProfile>, sqlx::Error>> + Send;

    /// Profiles whose role contains `search`, in insertion order.
    fn list_profiles(
        &self,
        search: Option<&str>,
    ) -> impl Future<Output = Result<Vec<GenerationProfile>, sqlx::Error>> + Send;

    /// Insert or replace by identifier. Replacing keeps the insertion position.
    fn upsert_profile(
        &self,
        profile: &GenerationProfile,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Returns `false` if no profile had that identifier.
    fn delete_profile(
        &self,
        identifier: &str,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
}

type ProfileRow = (
    String,
    String,
    Option<f64>,
    Option<i64>,
    Option<f64>,
    Option<i64>,
    Option<String>,
    Option<i64>,
);

const PROFILE_COLUMNS: &str =
    "identifier, role, temperature, max_tokens, top_p, top_k, model_path, seed";

fn from_row(
    (identifier, role, temperature, max_tokens, top_p, top_k, model_path, seed): ProfileRow,
) -> GenerationProfile {
    let role = role.parse().unwrap_or_else(|_| {
        tracing::warn!(identifier = %identifier, raw = %role, "unknown profile role; using user");
        Role::User
    });
    GenerationProfile {
        identifier,
        role,
        temperature: temperature.map(|v| v as f32),
        max_tokens: max_tokens.and_then(|v| u32::try_from(v).ok()),
        top_p: top_p.map(|v| v as f32),
        top_k: top_k.and_then(|v| u32::try_from(v).ok()),
        model_path,
        seed,
    }
}

impl ProfileStore for SqliteStore {
    async fn get_profile(&self, identifier: &str) -> Result<Option<GenerationProfile>, sqlx::Error> {
        let row: Option<ProfileRow> = sqlx::query_as(&format!(
            "SELECT {PROFILE_COLUMNS} FROM generation_profiles WHERE identifier = ?1"
        ))
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(from_row))
    }

    async fn find_profile_by_role(&self, role: Role) -> Result<Option<GenerationProfile>, sqlx::Error> {
        let row: Option<ProfileRow> = sqlx::query_as(&format!(
            "SELECT {PROFILE_COLUMNS} FROM generation_profiles \
             WHERE role = ?1 ORDER BY rowid ASC LIMIT 1"
        ))
        .bind(role.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(from_row))
    }

    async fn list_profiles(&self, search: Option<&str>) -> Result<Vec<GenerationProfile>, sqlx::Error> {
        let rows: Vec<ProfileRow> = match search.map(str::trim).filter(|s| !s.is_empty()) {
            Some(term) => {
                sqlx::query_as(&format!(
                    "SELECT {PROFILE_COLUMNS} FROM generation_profiles \
                     WHERE role LIKE '%' || ?1 || '%' ORDER BY rowid ASC"
                ))
                .bind(term)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {PROFILE_COLUMNS} FROM generation_profiles ORDER BY rowid ASC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows.into_iter().map(from_row).collect())
    }

    async fn upsert_profile(&self, profile: &GenerationProfile) -> Result<(), sqlx::Error> {
        let now = format_timestamp(Utc::now());
        sqlx::query(
            "INSERT INTO generation_profiles \
             (identifier, role, temperature, max_tokens, top_p, top_k, model_path, seed, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9) \
             ON CONFLICT(identifier) DO UPDATE SET \
                 role = ?2, temperature = ?3, max_tokens = ?4, top_p = ?5, \
                 top_k = ?6, model_path = ?7, seed = ?8, updated_at = ?9",
        )
        .bind(&profile.identifier)
        .bind(profile.role.to_string())
        .bind(profile.temperature.map(f64::from))
        .bind(profile.max_tokens.map(i64::from))
        .bind(profile.top_p.map(f64::from))
        .bind(profile.top_k.map(i64::from))
        .bind(&profile.model_path)
        .bind(profile.seed)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_profile(&self, identifier: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM generation_profiles WHERE identifier = ?1")
            .bind(identifier)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl ProfileLookup for SqliteStore {
    async fn find_profile(&self, role: Role) -> Result<Option<GenerationProfile>, BoxError> {
        Ok(self.find_profile_by_role(role).await?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    fn profile(identifier: &str, role: Role, temperature: Option<f32>) -> GenerationProfile {
        GenerationProfile {
            temperature,
            ..GenerationProfile::new(identifier, role)
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips_nullable_fields() {
        let store = store().await;
        let mut p = profile("assistant", Role::Assistant, Some(0.2));
        p.max_tokens = Some(500);
        p.seed = Some(-1);
        store.upsert_profile(&p).await.unwrap();

        let loaded = store.get_profile("assistant").await.unwrap().unwrap();
        assert_eq!(loaded, p);
        assert_eq!(loaded.top_p, None);
        assert_eq!(loaded.model_path, None);
    }

    #[tokio::test]
    async fn first_inserted_profile_wins_for_a_role() {
        let store = store().await;
        store.upsert_profile(&profile("first", Role::User, Some(0.1))).await.unwrap();
        store.upsert_profile(&profile("second", Role::User, Some(0.9))).await.unwrap();
        // Replacing keeps the original position.
        store.upsert_profile(&profile("first", Role::User, Some(0.3))).await.unwrap();

        let found = store.find_profile_by_role(Role::User).await.unwrap().unwrap();
        assert_eq!(found.identifier, "first");
        assert_eq!(found.temperature, Some(0.3));
        assert!(store.find_profile_by_role(Role::System).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_filters_by_role_substring() {
        let store = store().await;
        store.upsert_profile(&profile("a", Role::Assistant, None)).await.unwrap();
        store.upsert_profile(&profile("s", Role::System, None)).await.unwrap();
        store.upsert_profile(&profile("u", Role::User, None)).await.unwrap();

        let hits = store.list_profiles(Some("sys")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].identifier, "s");

        // "s" appears in "assistant", "system" and "user".
        assert_eq!(store.list_profiles(Some("s")).await.unwrap().len(), 3);
        assert_eq!(store.list_profiles(Some("  ")).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn delete_reports_missing_rows() {
        let store = store().await;
        store.upsert_profile(&profile("gone", Role::User, None)).await.unwrap();

        assert!(store.delete_profile("gone").await.unwrap());
        assert!(!store.delete_profile("gone").await.unwrap());
    }
}
