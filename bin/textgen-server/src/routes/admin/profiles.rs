//! Admin views over stored generation profiles.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use tracing::{debug, info};
use utoipa::OpenApi;

use crate::entities::ProfileStore;
use crate::error::ServerError;
use crate::schemas::admin::profile::{ProfileBody, ProfileListQuery, ProfileResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_profiles, get_profile, put_profile, delete_profile),
    components(schemas(ProfileResponse, ProfileBody))
)]
pub struct ProfilesApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/profiles", get(list_profiles))
        .route(
            "/profiles/{identifier}",
            get(get_profile).put(put_profile).delete(delete_profile),
        )
}

/// List profiles, optionally filtered by a role substring.
#[utoipa::path(
    get,
    path = "/admin/profiles",
    tag = "admin",
    params(ProfileListQuery),
    responses(
        (status = 200, description = "Stored profiles", body = Vec<ProfileResponse>),
    )
)]
pub async fn list_profiles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProfileListQuery>,
) -> Result<Json<Vec<ProfileResponse>>, ServerError> {
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let profiles = state.store.list_profiles(search).await?;
    Ok(Json(profiles.into_iter().map(ProfileResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/admin/profiles/{identifier}",
    tag = "admin",
    params(("identifier" = String, Path, description = "Profile identifier")),
    responses(
        (status = 200, description = "Profile found", body = ProfileResponse),
        (status = 404, description = "No such profile"),
    )
)]
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
) -> Result<Json<ProfileResponse>, ServerError> {
    state
        .store
        .get_profile(&identifier)
        .await?
        .map(|p| Json(p.into()))
        .ok_or_else(|| ServerError::NotFound(format!("profile '{identifier}' not found")))
}

/// Create or replace a profile.
///
/// Changes to the `default` profile apply to generation immediately but are
/// shown on the index page only after a restart.
#[utoipa::path(
    put,
    path = "/admin/profiles/{identifier}",
    tag = "admin",
    params(("identifier" = String, Path, description = "Profile identifier")),
    request_body = ProfileBody,
    responses(
        (status = 200, description = "Profile stored", body = ProfileResponse),
        (status = 400, description = "Malformed JSON, invalid role or out-of-range value"),
    )
)]
pub async fn put_profile(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
    body: Bytes,
) -> Result<Json<ProfileResponse>, ServerError> {
    let identifier = identifier.trim().to_owned();
    if identifier.is_empty() {
        return Err(ServerError::BadRequest("identifier: must not be empty".to_owned()));
    }

    let body: ProfileBody = serde_json::from_slice(&body).map_err(|e| {
        debug!(error = %e, "rejecting malformed profile body");
        ServerError::BadRequest("Invalid JSON".to_owned())
    })?;

    let profile = body
        .into_profile(identifier)
        .map_err(|e| ServerError::BadRequest(e.to_string()))?;
    state.store.upsert_profile(&profile).await?;
    info!(identifier = %profile.identifier, role = %profile.role, "profile stored");

    Ok(Json(profile.into()))
}

#[utoipa::path(
    delete,
    path = "/admin/profiles/{identifier}",
    tag = "admin",
    params(("identifier" = String, Path, description = "Profile identifier")),
    responses(
        (status = 204, description = "Profile deleted"),
        (status = 404, description = "No such profile"),
    )
)]
pub async fn delete_profile(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
) -> Result<StatusCode, ServerError> {
    if state.store.delete_profile(&identifier).await? {
        info!(%identifier, "profile deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ServerError::NotFound(format!("profile '{identifier}' not found")))
    }
}
