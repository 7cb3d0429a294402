//! Model backend capability.
//!
//! A [`ModelLoader`] turns a model path plus fixed [`RuntimeOptions`] into a
//! [`ModelBackend`], which runs single completion calls. The llama.cpp
//! implementation lives behind the `llama` feature; tests drive the invoker
//! with in-memory fakes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use strum::Display;
use thiserror::Error;

use crate::params::SamplingParameters;

/// Load-time options. These are fixed for every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeOptions {
    /// Layers to offload to the GPU. `u32::MAX` offloads all of them.
    pub n_gpu_layers: u32,
    pub batch_size: u32,
    pub threads: i32,
    pub context_window: u32,
    pub chat_format: String,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            n_gpu_layers: u32::MAX,
            batch_size: 512,
            threads: 4,
            context_window: 4096,
            chat_format: "qwen".to_owned(),
        }
    }
}

/// One raw completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_tokens: u32,
    pub stop_sequences: Vec<String>,
    /// `None` picks a random seed.
    pub seed: Option<u32>,
    /// Include the prompt in the returned text.
    pub echo: bool,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, sampling: &SamplingParameters) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            top_k: sampling.top_k,
            max_tokens: sampling.max_tokens,
            stop_sequences: sampling.stop_sequences.clone(),
            seed: sampling.seed,
            echo: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    /// End-of-generation token or stop sequence.
    Stop,
    /// `max_tokens` reached.
    Length,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionChoice {
    pub text: String,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Completion {
    pub choices: Vec<CompletionChoice>,
}

impl Completion {
    pub fn single(text: impl Into<String>, finish_reason: FinishReason) -> Self {
        Self {
            choices: vec![CompletionChoice {
                text: text.into(),
                finish_reason,
            }],
        }
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("model file not found: {}", path.display())]
    ModelNotFound { path: PathBuf },

    #[error("unsupported or malformed model at {}: {reason}", path.display())]
    InvalidModel { path: PathBuf, reason: String },

    #[error("prompt of {prompt_tokens} tokens does not fit a {context_window} token context")]
    ContextExceeded {
        prompt_tokens: usize,
        context_window: u32,
    },

    #[error("backend execution failed: {0}")]
    Execution(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A loaded model that can run completions.
pub trait ModelBackend: Send + Sync {
    /// Run one blocking completion.
    fn complete(&self, request: &CompletionRequest) -> Result<Completion, BackendError>;
}

/// Produces backends bound to a model file.
pub trait ModelLoader: Send + Sync {
    /// Load the model at `model_path`. Blocking.
    fn load(
        &self,
        model_path: &Path,
        options: &RuntimeOptions,
    ) -> Result<Arc<dyn ModelBackend>, BackendError>;
}

/// Loader for builds without an inference backend.
///
/// Distinguishes a missing file from everything else so the HTTP layer can
/// still report "model not found" correctly.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableLoader;

impl ModelLoader for UnavailableLoader {
    fn load(
        &self,
        model_path: &Path,
        _options: &RuntimeOptions,
    ) -> Result<Arc<dyn ModelBackend>, BackendError> {
        if !model_path.is_file() {
            return Err(BackendError::ModelNotFound {
                path: model_path.to_path_buf(),
            });
        }
        Err(BackendError::InvalidModel {
            path: model_path.to_path_buf(),
            reason: "textgen was built without the `llama` feature".to_owned(),
        })
    }
}
