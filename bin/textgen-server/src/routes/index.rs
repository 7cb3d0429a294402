//! Chat page: history plus a prompt form.
//!
//! `POST /` serves two clients. Browsers submit the form and get a 303 back
//! to `/`, with `?status=` set when something went wrong. Scripts post JSON
//! and get the same body as `POST /generate/`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{FromRequest, Query, Request, State};
use axum::http::{HeaderMap, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use minijinja::context;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::entities::ChatStore;
use crate::error::ServerError;
use crate::routes::generate::{parse_json, run_generation};
use crate::schemas::generate::GenerateForm;
use crate::state::AppState;
use crate::templates;

const GENERATION_FAILED_NOTICE: &str = "Generation failed. See server logs for details.";
const INVALID_SETTINGS_NOTICE: &str = "Invalid generation settings. Check the values and try again.";

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(index).post(submit))
}

#[derive(Debug, Default, Deserialize)]
pub struct IndexQuery {
    pub status: Option<String>,
}

pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IndexQuery>,
) -> Result<Html<String>, ServerError> {
    let chats = state.store.list_chats(state.config.history_limit).await?;

    let notice = match query.status.as_deref() {
        Some("failed") => Some(GENERATION_FAILED_NOTICE),
        Some("invalid") => Some(INVALID_SETTINGS_NOTICE),
        _ => None,
    };

    let html = state
        .templates
        .get_template(templates::INDEX)
        .and_then(|t| {
            t.render(context! {
                chats => chats,
                settings => state.defaults.as_ref(),
                notice => notice,
            })
        })
        .map_err(|e| ServerError::Internal(format!("failed to render index: {e}")))?;

    Ok(Html(html))
}

pub async fn submit(State(state): State<Arc<AppState>>, req: Request) -> Response {
    if is_json(req.headers()) {
        return submit_json(state, req).await;
    }

    let Form(form) = match Form::<GenerateForm>::from_request(req, &state).await {
        Ok(form) => form,
        Err(rejection) => {
            warn!(error = %rejection, "rejecting unreadable form submission");
            return Redirect::to("/?status=invalid").into_response();
        }
    };

    let (prompt, raw) = form.into_parts();
    if prompt.as_deref().is_none_or(|p| p.trim().is_empty()) {
        debug!("empty prompt submitted; nothing to generate");
        return Redirect::to("/").into_response();
    }

    let target = match run_generation(&state, (prompt, raw)).await {
        Ok(_) => "/",
        Err(ServerError::BadRequest(reason)) => {
            debug!(%reason, "form overrides rejected");
            "/?status=invalid"
        }
        Err(_) => "/?status=failed",
    };
    Redirect::to(target).into_response()
}

async fn submit_json(state: Arc<AppState>, req: Request) -> Response {
    let body = match Bytes::from_request(req, &state).await {
        Ok(body) => body,
        Err(rejection) => return rejection.into_response(),
    };

    let result = match parse_json(&body) {
        Ok(request) => run_generation(&state, request.into_parts()).await,
        Err(e) => Err(e),
    };
    result.map(Json).into_response()
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().starts_with("application/json"))
}
