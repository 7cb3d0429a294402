//! One completion call with every failure normalised into [`GenerationFailure`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use strum::Display;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::backend::{BackendError, CompletionRequest, ModelLoader, RuntimeOptions};
use crate::params::ResolvedParameters;
use crate::stop;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// No file at the resolved model path.
    ModelNotFound,
    /// The model file is malformed or unsupported.
    Backend,
    /// Context overflow or a runtime fault during decoding.
    Execution,
    /// The configured generation timeout elapsed.
    Timeout,
    /// Anything else, including a panic inside the backend.
    Unknown,
}

/// Why a generation produced no text. `detail` is for server logs only.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {detail}")]
pub struct GenerationFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl GenerationFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl From<BackendError> for GenerationFailure {
    fn from(e: BackendError) -> Self {
        let kind = match &e {
            BackendError::ModelNotFound { .. } => FailureKind::ModelNotFound,
            BackendError::InvalidModel { .. } => FailureKind::Backend,
            BackendError::ContextExceeded { .. } | BackendError::Execution(_) => FailureKind::Execution,
            BackendError::Other(_) => FailureKind::Unknown,
        };
        Self::new(kind, format!("{e:#}"))
    }
}

/// Stateless bridge between resolved parameters and a model backend.
pub struct GenerationInvoker {
    loader: Arc<dyn ModelLoader>,
    options: RuntimeOptions,
}

impl std::fmt::Debug for GenerationInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationInvoker")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl GenerationInvoker {
    pub fn new(loader: Arc<dyn ModelLoader>, options: RuntimeOptions) -> Self {
        Self { loader, options }
    }

    /// Load the model and run one completion. Blocking.
    ///
    /// Never panics: backend panics are caught and reported as
    /// [`FailureKind::Unknown`]. Each failure is logged once at error level.
    pub fn invoke(&self, params: &ResolvedParameters) -> Result<String, GenerationFailure> {
        let started = Instant::now();
        let model_path = params.sampling.model_path.as_str();
        info!(model_path, role = %params.role, "generating text");

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run(params)))
            .unwrap_or_else(|payload| Err(GenerationFailure::new(FailureKind::Unknown, panic_message(payload))));

        match &result {
            Ok(text) => info!(
                model_path,
                len = text.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "text generated"
            ),
            Err(failure) => error!(
                model_path,
                kind = %failure.kind,
                detail = %failure.detail,
                "text generation failed"
            ),
        }
        result
    }

    fn run(&self, params: &ResolvedParameters) -> Result<String, GenerationFailure> {
        let sampling = &params.sampling;
        let backend = self.loader.load(Path::new(&sampling.model_path), &self.options)?;

        let request = CompletionRequest::new(params.prompt.as_str(), sampling);
        debug!(
            temperature = request.temperature,
            max_tokens = request.max_tokens,
            top_p = request.top_p,
            top_k = request.top_k,
            seed = ?request.seed,
            "calling model"
        );

        let completion = backend.complete(&request)?;
        let choice = completion.choices.into_iter().next().ok_or_else(|| {
            GenerationFailure::new(FailureKind::Unknown, "backend returned no completion choices")
        })?;
        debug!(finish_reason = %choice.finish_reason, "completion finished");

        Ok(stop::truncate_at_stop(choice.text, &request.stop_sequences))
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_owned());
    format!("backend panicked: {message}")
}

#[cfg(test)]
pub(crate) mod test {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tracing_test::traced_test;

    use super::*;
    use crate::backend::{Completion, FinishReason, ModelBackend};
    use crate::params::{GenerationDefaults, Role, SamplingParameters};

    /// What the fake backend does when asked to load or complete.
    #[derive(Debug, Clone)]
    pub(crate) enum Script {
        Reply(String),
        NoChoices,
        MissingModel,
        BadModel,
        ContextOverflow,
        Panic,
        Other,
    }

    /// Fake loader that records every request it sees.
    pub(crate) struct FakeLoader {
        script: Script,
        pub loads: AtomicUsize,
        pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
    }

    impl FakeLoader {
        pub(crate) fn new(script: Script) -> Self {
            Self {
                script,
                loads: AtomicUsize::new(0),
                requests: Arc::default(),
            }
        }

        pub(crate) fn replying(text: &str) -> Self {
            Self::new(Script::Reply(text.to_owned()))
        }
    }

    struct FakeBackend {
        script: Script,
        requests: Arc<Mutex<Vec<CompletionRequest>>>,
    }

    impl ModelBackend for FakeBackend {
        fn complete(&self, request: &CompletionRequest) -> Result<Completion, BackendError> {
            self.requests.lock().unwrap().push(request.clone());
            match &self.script {
                Script::Reply(text) => Ok(Completion::single(text.clone(), FinishReason::Stop)),
                Script::NoChoices => Ok(Completion::default()),
                Script::ContextOverflow => Err(BackendError::ContextExceeded {
                    prompt_tokens: 5000,
                    context_window: 4096,
                }),
                Script::Panic => panic!("ggml assertion failed"),
                Script::Other => Err(anyhow::anyhow!("sampler exploded").into()),
                Script::MissingModel | Script::BadModel => unreachable!("load fails first"),
            }
        }
    }

    impl ModelLoader for FakeLoader {
        fn load(
            &self,
            model_path: &Path,
            _options: &RuntimeOptions,
        ) -> Result<Arc<dyn ModelBackend>, BackendError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                Script::MissingModel => Err(BackendError::ModelNotFound {
                    path: model_path.to_path_buf(),
                }),
                Script::BadModel => Err(BackendError::InvalidModel {
                    path: model_path.to_path_buf(),
                    reason: "bad magic".into(),
                }),
                script => Ok(Arc::new(FakeBackend {
                    script: script.clone(),
                    requests: Arc::clone(&self.requests),
                })),
            }
        }
    }

    pub(crate) fn params(prompt: &str) -> ResolvedParameters {
        let d = GenerationDefaults::default();
        ResolvedParameters {
            prompt: prompt.to_owned(),
            role: Role::User,
            sampling: SamplingParameters {
                temperature: d.temperature,
                max_tokens: d.max_tokens,
                top_p: d.top_p,
                top_k: d.top_k,
                model_path: d.model_path,
                seed: d.seed,
                stop_sequences: d.stop_sequences,
            },
        }
    }

    fn invoker(loader: FakeLoader) -> (GenerationInvoker, Arc<Mutex<Vec<CompletionRequest>>>) {
        let requests = Arc::clone(&loader.requests);
        (
            GenerationInvoker::new(Arc::new(loader), RuntimeOptions::default()),
            requests,
        )
    }

    #[test]
    fn returns_first_choice_text_without_echo() {
        let (invoker, requests) = invoker(FakeLoader::replying("Gravity pulls things together."));
        let text = invoker.invoke(&params("Explain gravity.")).unwrap();

        assert_eq!(text, "Gravity pulls things together.");
        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].echo);
        assert_eq!(requests[0].prompt, "Explain gravity.");
        assert_eq!(requests[0].top_k, 50);
    }

    #[test]
    fn text_is_cut_before_the_first_stop_sequence() {
        let (invoker, _) = invoker(FakeLoader::replying("A: yes\n\nQ: and then?"));
        assert_eq!(invoker.invoke(&params("q")).unwrap(), "A: yes");
    }

    #[test]
    fn empty_text_is_a_success() {
        let (invoker, _) = invoker(FakeLoader::replying(""));
        assert_eq!(invoker.invoke(&params("q")), Ok(String::new()));
    }

    #[test]
    #[traced_test]
    fn every_failure_cause_is_classified_and_logged() {
        let cases = [
            (Script::MissingModel, FailureKind::ModelNotFound),
            (Script::BadModel, FailureKind::Backend),
            (Script::ContextOverflow, FailureKind::Execution),
            (Script::Other, FailureKind::Unknown),
            (Script::Panic, FailureKind::Unknown),
            (Script::NoChoices, FailureKind::Unknown),
        ];

        for (script, expected) in cases {
            let (invoker, _) = invoker(FakeLoader::new(script.clone()));
            let failure = invoker.invoke(&params("q")).unwrap_err();
            assert_eq!(failure.kind, expected, "{script:?}");
        }

        logs_assert(|lines: &[&str]| {
            let failures = lines
                .iter()
                .filter(|line| line.contains("ERROR") && line.contains("text generation failed"))
                .count();
            match failures {
                6 => Ok(()),
                n => Err(format!("expected 6 failure entries, found {n}")),
            }
        });
    }

    #[test]
    #[traced_test]
    fn panic_detail_stays_in_logs() {
        let (invoker, _) = invoker(FakeLoader::new(Script::Panic));
        let failure = invoker.invoke(&params("q")).unwrap_err();

        assert!(failure.detail.contains("ggml assertion failed"));
        assert!(logs_contain("backend panicked"));
    }
}
