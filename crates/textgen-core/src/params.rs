//! Parameter types shared by the resolver, the invoker and the stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 200;
pub const DEFAULT_TOP_P: f32 = 1.0;
pub const DEFAULT_TOP_K: u32 = 50;
pub const DEFAULT_MODEL_PATH: &str = "models/qwen2.5-1.5b-instruct-q4_k_m.gguf";
pub const DEFAULT_STOP_SEQUENCES: [&str; 2] = ["Q:", "\n\n"];

/// Identifier of the singleton profile shown on the index page.
pub const DEFAULT_PROFILE_IDENTIFIER: &str = "default";

/// Label selecting which persisted profile applies to a request.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    #[default]
    User,
    Assistant,
    System,
}

/// A persisted bundle of sampling parameters for one role.
///
/// Every sampling field is optional; `None` means "not present" and lets the
/// resolver fall through to the compiled default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationProfile {
    pub identifier: String,
    pub role: Role,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub model_path: Option<String>,
    /// Negative values mean non-deterministic.
    pub seed: Option<i64>,
}

impl GenerationProfile {
    /// An empty profile for `role`: every field falls through to defaults.
    pub fn new(identifier: impl Into<String>, role: Role) -> Self {
        Self {
            identifier: identifier.into(),
            role,
            temperature: None,
            max_tokens: None,
            top_p: None,
            top_k: None,
            model_path: None,
            seed: None,
        }
    }

    /// The stored model path, ignoring blank values.
    pub fn model_path(&self) -> Option<&str> {
        self.model_path.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }

    /// The stored seed as a backend seed. Negative or oversized values are
    /// treated as non-deterministic.
    pub fn seed(&self) -> Option<u32> {
        self.seed.and_then(|s| u32::try_from(s).ok())
    }
}

/// Compiled-in fallback values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationDefaults {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
    pub model_path: String,
    pub seed: Option<u32>,
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            top_p: DEFAULT_TOP_P,
            top_k: DEFAULT_TOP_K,
            model_path: DEFAULT_MODEL_PATH.to_owned(),
            seed: None,
            stop_sequences: DEFAULT_STOP_SEQUENCES.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

impl GenerationDefaults {
    /// Replace the default model path. Blank paths are ignored.
    pub fn with_model_path(mut self, model_path: impl Into<String>) -> Self {
        let model_path = model_path.into();
        if !model_path.trim().is_empty() {
            self.model_path = model_path.trim().to_owned();
        }
        self
    }
}

/// Final sampling values after overrides, profile and defaults are merged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplingParameters {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
    pub model_path: String,
    /// `None` lets the backend pick a random seed.
    pub seed: Option<u32>,
    pub stop_sequences: Vec<String>,
}

/// Everything one generation call needs. Built per request and never shared.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedParameters {
    pub prompt: String,
    pub role: Role,
    #[serde(flatten)]
    pub sampling: SamplingParameters,
}

/// One persisted prompt/response pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: Uuid,
    pub prompt: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

impl ChatRecord {
    pub fn new(prompt: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            response: response.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert_eq!("SYSTEM".parse::<Role>().unwrap(), Role::System);
        assert!("moderator".parse::<Role>().is_err());
        assert_eq!(Role::default().to_string(), "user");
    }

    #[test]
    fn blank_profile_model_path_is_absent() {
        let mut profile = GenerationProfile::new("p", Role::User);
        profile.model_path = Some("   ".into());
        assert_eq!(profile.model_path(), None);

        profile.model_path = Some(" models/a.gguf ".into());
        assert_eq!(profile.model_path(), Some("models/a.gguf"));
    }

    #[test]
    fn negative_profile_seed_is_random() {
        let mut profile = GenerationProfile::new("p", Role::User);
        profile.seed = Some(-1);
        assert_eq!(profile.seed(), None);

        profile.seed = Some(1337);
        assert_eq!(profile.seed(), Some(1337));
    }

    #[test]
    fn defaults_keep_model_path_when_override_is_blank() {
        let defaults = GenerationDefaults::default().with_model_path("  ");
        assert_eq!(defaults.model_path, DEFAULT_MODEL_PATH);
        assert_eq!(defaults.stop_sequences, vec!["Q:", "\n\n"]);
    }
}
