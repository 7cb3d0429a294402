//! Parameter resolution and generation invocation for textgen.
//!
//! The flow of a single request is:
//!
//! 1. [`GenerationInput::parse`] turns raw request fields into a prompt, a
//!    [`Role`] and typed [`SamplingOverrides`].
//! 2. [`ParameterResolver`] merges overrides, the role's persisted
//!    [`GenerationProfile`] and compiled defaults into [`ResolvedParameters`].
//! 3. [`GenerationInvoker`] loads a [`ModelBackend`] through a
//!    [`ModelLoader`] and runs one completion, normalising every failure into
//!    a [`GenerationFailure`].
//! 4. [`TextGenerator`] ties the steps together and hands non-empty results
//!    to a [`ChatRecorder`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use textgen_core::{
//!     GenerationDefaults, GenerationInput, GenerationInvoker, RawOverrides, RuntimeOptions,
//!     TextGenerator,
//! };
//! # async fn run(
//! #     profiles: impl textgen_core::ProfileLookup,
//! #     chats: impl textgen_core::ChatRecorder,
//! # ) {
//! let invoker = GenerationInvoker::new(textgen_core::default_loader(), RuntimeOptions::default());
//! let generator = TextGenerator::new(
//!     GenerationDefaults::default(),
//!     Arc::new(invoker),
//!     profiles,
//!     chats,
//! );
//!
//! let input = GenerationInput::parse(Some("Explain gravity."), RawOverrides::default()).unwrap();
//! match generator.generate(input).await {
//!     Ok(report) => println!("{}", report.text),
//!     Err(failure) => eprintln!("generation failed: {}", failure.kind),
//! }
//! # }
//! ```

mod backend;
mod cache;
mod invoker;
#[cfg(feature = "llama")]
mod llama;
mod overrides;
mod params;
mod pipeline;
mod resolver;
mod stop;

use std::sync::Arc;

pub use backend::{
    BackendError, Completion, CompletionChoice, CompletionRequest, FinishReason, ModelBackend,
    ModelLoader, RuntimeOptions, UnavailableLoader,
};
pub use cache::CachingLoader;
pub use invoker::{FailureKind, GenerationFailure, GenerationInvoker};
#[cfg(feature = "llama")]
pub use llama::LlamaLoader;
pub use overrides::{GenerationInput, InputError, OverrideError, RawOverrides, RawValue, SamplingOverrides};
pub use params::{
    ChatRecord, GenerationDefaults, GenerationProfile, ResolvedParameters, Role, SamplingParameters,
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL_PATH, DEFAULT_PROFILE_IDENTIFIER, DEFAULT_STOP_SEQUENCES,
    DEFAULT_TEMPERATURE, DEFAULT_TOP_K, DEFAULT_TOP_P,
};
pub use pipeline::{ChatRecorder, GenerationReport, TextGenerator};
pub use resolver::{ParameterResolver, ProfileLookup};
pub use stop::find_stop;

/// Boxed error returned by store capabilities the core does not own.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The loader this build was compiled with.
///
/// With the `llama` feature this is [`LlamaLoader`]; otherwise it is
/// [`UnavailableLoader`], which still reports missing model files but cannot
/// run a model.
pub fn default_loader() -> Arc<dyn ModelLoader> {
    #[cfg(feature = "llama")]
    {
        Arc::new(LlamaLoader::new())
    }
    #[cfg(not(feature = "llama"))]
    {
        Arc::new(UnavailableLoader)
    }
}
