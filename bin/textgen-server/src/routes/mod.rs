//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection, panic capture)
//! - Optional Swagger UI / OpenAPI spec endpoint (disable with `TEXTGEN_ENABLE_SWAGGER=false`)
//! - Health route
//! - The chat page at `/` and the JSON generation endpoint
//! - Chat history and admin profile routes

mod admin;
mod chats;
pub mod doc;
mod generate;
mod health;
mod index;

#[cfg(test)]
pub(crate) mod test_support;

use std::any::Any;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use axum::{Router, middleware};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ServerError;
use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .merge(health::router())
        .merge(index::router())
        .merge(generate::router())
        .nest("/api", chats::router())
        .nest("/admin", admin::router());

    let mut app = Router::new().merge(api_router);

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app
        // Outermost layers execute first on the way in.
        .layer(
            ServiceBuilder::new()
                .layer(cors::cors_layer(&state))
                .layer(middleware::from_fn(trace::trace_middleware))
                .layer(CatchPanicLayer::custom(panic_response)),
        )
        .with_state(state)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    ServerError::Internal(format!("handler panicked: {detail}")).into_response()
}

#[cfg(test)]
mod test {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use tower::ServiceExt;

    use super::*;
    use crate::routes::test_support::{TestApp, body_text, request_json, send};

    #[tokio::test]
    async fn panics_become_internal_errors() {
        let app = Router::new()
            .route("/boom", get(|| async { panic!("kaboom") as () }))
            .layer(CatchPanicLayer::custom(panic_response));

        let response = app
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let app = TestApp::replying("ok").await;
        let (status, body) = request_json(&app.router, "GET", "/api-docs/openapi.json", None).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/generate/"].is_object());
        assert!(body["paths"]["/admin/profiles/{identifier}"].is_object());
    }

    #[tokio::test]
    async fn responses_carry_a_trace_id() {
        let app = TestApp::replying("ok").await;
        let response = send(&app.router, Request::get("/health").body(Body::empty()).unwrap()).await;

        assert!(response.headers().contains_key(trace::X_TRACE_ID));
    }
}
