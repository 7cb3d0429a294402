//! Generation request / response types.
//!
//! Numeric overrides accept either JSON numbers or strings, matching what
//! HTML forms and loosely-typed clients send. Values of any other JSON type
//! are kept as-is so coercion can reject them by field name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use textgen_core::{GenerationReport, RawOverrides, RawValue};
use utoipa::ToSchema;

/// Request body for `POST /generate/` and JSON `POST /`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct GenerateRequest {
    /// Text to complete. Required and non-blank.
    pub prompt: Option<String>,
    /// Profile to apply: `user` (default), `assistant` or `system`.
    #[schema(value_type = Option<String>)]
    pub role: Option<RawValue>,
    /// GGUF model file to load.
    #[serde(alias = "modelPath")]
    #[schema(value_type = Option<String>)]
    pub model_path: Option<RawValue>,
    /// Sampling temperature, `>= 0`.
    #[schema(value_type = Option<f32>)]
    pub temperature: Option<RawValue>,
    /// Maximum tokens to generate, `> 0`.
    #[serde(alias = "maxTokens")]
    #[schema(value_type = Option<u32>)]
    pub max_tokens: Option<RawValue>,
    /// Nucleus sampling threshold in `[0, 1]`.
    #[serde(alias = "topP")]
    #[schema(value_type = Option<f32>)]
    pub top_p: Option<RawValue>,
    /// Top-k sampling, `>= 0`.
    #[serde(alias = "topK")]
    #[schema(value_type = Option<u32>)]
    pub top_k: Option<RawValue>,
    /// Sampling seed; negative means random.
    #[schema(value_type = Option<i64>)]
    pub seed: Option<RawValue>,
    /// Strings that end generation. Empty uses the defaults.
    #[serde(alias = "stopSequences")]
    pub stop_sequences: Option<Vec<String>>,
}

impl GenerateRequest {
    pub fn into_parts(self) -> (Option<String>, RawOverrides) {
        (
            self.prompt,
            RawOverrides {
                role: self.role,
                model_path: self.model_path,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                top_p: self.top_p,
                top_k: self.top_k,
                seed: self.seed,
                stop_sequences: self.stop_sequences,
            },
        )
    }
}

/// Form body for `POST /`. Field names follow the chat page's inputs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateForm {
    pub prompt: Option<String>,
    pub role: Option<String>,
    #[serde(alias = "modelPath")]
    pub model_path: Option<String>,
    pub temperature: Option<String>,
    #[serde(alias = "maxTokens")]
    pub max_tokens: Option<String>,
    #[serde(alias = "topP")]
    pub top_p: Option<String>,
    #[serde(alias = "topK")]
    pub top_k: Option<String>,
    pub seed: Option<String>,
}

impl GenerateForm {
    pub fn into_parts(self) -> (Option<String>, RawOverrides) {
        (
            self.prompt,
            RawOverrides {
                role: self.role.map(RawValue::Text),
                model_path: self.model_path.map(RawValue::Text),
                temperature: self.temperature.map(RawValue::Text),
                max_tokens: self.max_tokens.map(RawValue::Text),
                top_p: self.top_p.map(RawValue::Text),
                top_k: self.top_k.map(RawValue::Text),
                seed: self.seed.map(RawValue::Text),
                stop_sequences: None,
            },
        )
    }
}

/// Response body for a successful generation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerateResponse {
    /// Always `true`.
    pub success: bool,
    /// The prompt as used, trimmed.
    pub prompt: String,
    /// Generated text; may be empty.
    pub response: String,
    /// When the chat record was written. `null` when nothing was stored.
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<GenerationReport> for GenerateResponse {
    fn from(report: GenerationReport) -> Self {
        Self {
            success: true,
            prompt: report.params.prompt,
            response: report.text,
            timestamp: report.record.map(|r| r.created_at),
        }
    }
}
