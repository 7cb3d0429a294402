pub mod profiles;

use std::sync::Arc;

use axum::Router;
use utoipa::OpenApi;

use crate::state::AppState;

// Routes nested under `/admin`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().merge(profiles::router())
}

#[derive(OpenApi)]
#[openapi()]
pub struct AdminApi;

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut spec = AdminApi::openapi();
    spec.merge(profiles::ProfilesApi::openapi());
    spec
}
