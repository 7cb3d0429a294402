//! JSON generation endpoint.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use textgen_core::{GenerationInput, RawOverrides};
use tracing::debug;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::generate::{GenerateRequest, GenerateResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(generate), components(schemas(GenerateRequest, GenerateResponse)))]
pub struct GenerateApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate", post(generate))
        .route("/generate/", post(generate))
}

/// Generate a completion for a prompt.
///
/// Overrides are optional; anything omitted comes from the role's stored
/// profile, then from compiled defaults.
#[utoipa::path(
    post,
    path = "/generate/",
    tag = "generate",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Text generated", body = GenerateResponse),
        (status = 400, description = "Missing prompt, malformed JSON or invalid override"),
        (status = 500, description = "Generation failed"),
        (status = 503, description = "Model file not found"),
        (status = 504, description = "Generation timed out"),
    )
)]
pub async fn generate(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<GenerateResponse>, ServerError> {
    let parts = parse_json(&body)?.into_parts();
    run_generation(&state, parts).await.map(Json)
}

/// Parse a JSON generation body. Every syntax or shape error reads
/// "Invalid JSON" to the client.
pub(crate) fn parse_json(body: &[u8]) -> Result<GenerateRequest, ServerError> {
    serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "rejecting malformed JSON body");
        ServerError::BadRequest("Invalid JSON".to_owned())
    })
}

pub(crate) async fn run_generation(
    state: &AppState,
    (prompt, raw): (Option<String>, RawOverrides),
) -> Result<GenerateResponse, ServerError> {
    let input = GenerationInput::parse(prompt.as_deref(), raw)?;
    let report = state.generator.generate(input).await?;
    Ok(report.into())
}
