use utoipa::OpenApi;

use crate::routes::{admin, chats, generate, health};

#[derive(OpenApi)]
#[openapi(info(
    title = "textgen-server",
    description = "Prompt-to-text generation over a local GGUF model",
    version = "0.1.0"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(generate::GenerateApi::openapi());
    root.merge(chats::ChatsApi::openapi());
    root.merge(admin::api_docs());
    root
}
