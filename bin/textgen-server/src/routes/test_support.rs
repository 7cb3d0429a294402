//! Router fixtures for route tests: in-memory SQLite plus a scripted loader.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use textgen_core::{
    BackendError, Completion, CompletionRequest, FinishReason, ModelBackend, ModelLoader,
    RuntimeOptions,
};
use tower::ServiceExt;

use crate::config::Config;
use crate::entities::SqliteStore;
use crate::state::AppState;

/// Loader that either replies with fixed text or reports a missing file.
#[derive(Default)]
pub struct RecordingLoader {
    reply: Option<String>,
    pub loads: AtomicUsize,
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

struct RecordingBackend {
    reply: String,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ModelBackend for RecordingBackend {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(Completion::single(self.reply.clone(), FinishReason::Stop))
    }
}

impl ModelLoader for RecordingLoader {
    fn load(
        &self,
        model_path: &Path,
        _options: &RuntimeOptions,
    ) -> Result<Arc<dyn ModelBackend>, BackendError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Some(reply) => Ok(Arc::new(RecordingBackend {
                reply: reply.clone(),
                requests: Arc::clone(&self.requests),
            })),
            None => Err(BackendError::ModelNotFound {
                path: model_path.to_path_buf(),
            }),
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: SqliteStore,
    pub loader: Arc<RecordingLoader>,
}

impl TestApp {
    pub async fn replying(text: &str) -> Self {
        Self::build(RecordingLoader {
            reply: Some(text.to_owned()),
            ..Default::default()
        })
        .await
    }

    pub async fn missing_model() -> Self {
        Self::build(RecordingLoader::default()).await
    }

    async fn build(loader: RecordingLoader) -> Self {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        let loader = Arc::new(loader);
        let config = Config {
            cache_models: false,
            ..Config::default()
        };
        let state = AppState::new(config, store.clone(), loader.clone()).await.unwrap();

        Self {
            router: super::build(Arc::new(state)),
            store,
            loader,
        }
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn post_raw(router: &Router, path: &str, content_type: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::post(path)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body.to_owned()))
        .unwrap();
    let response = send(router, request).await;
    let status = response.status();
    (status, serde_json::from_str(&body_text(response).await).unwrap())
}

pub async fn post_json(router: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    post_raw(router, path, "application/json", &body.to_string()).await
}

pub async fn request_json(router: &Router, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(path);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = send(router, request).await;
    let status = response.status();
    let text = body_text(response).await;
    let value = if text.is_empty() { Value::Null } else { serde_json::from_str(&text).unwrap() };
    (status, value)
}
