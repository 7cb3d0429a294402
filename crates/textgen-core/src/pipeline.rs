//! The full generation flow: resolve, invoke off the executor, record.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use crate::BoxError;
use crate::invoker::{FailureKind, GenerationFailure, GenerationInvoker};
use crate::overrides::GenerationInput;
use crate::params::{ChatRecord, GenerationDefaults, ResolvedParameters};
use crate::resolver::{ParameterResolver, ProfileLookup};

/// Write access to chat history.
pub trait ChatRecorder: Send + Sync {
    fn record_chat(&self, record: ChatRecord) -> impl Future<Output = Result<(), BoxError>> + Send;
}

/// Outcome of a successful generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    pub params: ResolvedParameters,
    pub text: String,
    /// The persisted record, or `None` when the text was empty or the write
    /// failed.
    pub record: Option<ChatRecord>,
}

pub struct TextGenerator<P, R> {
    resolver: ParameterResolver,
    invoker: Arc<GenerationInvoker>,
    profiles: P,
    recorder: R,
    timeout: Option<Duration>,
}

impl<P, R> TextGenerator<P, R>
where
    P: ProfileLookup,
    R: ChatRecorder,
{
    pub fn new(
        defaults: GenerationDefaults,
        invoker: Arc<GenerationInvoker>,
        profiles: P,
        recorder: R,
    ) -> Self {
        Self {
            resolver: ParameterResolver::new(defaults),
            invoker,
            profiles,
            recorder,
            timeout: None,
        }
    }

    /// Fail generations that run longer than `timeout`. The blocking call
    /// itself keeps running to completion.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn defaults(&self) -> &GenerationDefaults {
        self.resolver.defaults()
    }

    /// Resolve parameters, run the model and record a non-empty result.
    ///
    /// Only the generation itself can fail. Profile lookup and record
    /// persistence errors are logged and swallowed.
    pub async fn generate(&self, input: GenerationInput) -> Result<GenerationReport, GenerationFailure> {
        let params = self.resolver.resolve(&input, &self.profiles).await;
        let text = self.invoke(params.clone()).await?;

        let record = if text.is_empty() {
            None
        } else {
            let record = ChatRecord::new(params.prompt.as_str(), text.as_str());
            match self.recorder.record_chat(record.clone()).await {
                Ok(()) => Some(record),
                Err(e) => {
                    warn!(error = %e, "failed to persist chat record");
                    None
                }
            }
        };

        Ok(GenerationReport { params, text, record })
    }

    async fn invoke(&self, params: ResolvedParameters) -> Result<String, GenerationFailure> {
        let invoker = Arc::clone(&self.invoker);
        let task = tokio::task::spawn_blocking(move || invoker.invoke(&params));

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    let failure = GenerationFailure::new(
                        FailureKind::Timeout,
                        format!("generation exceeded {}s", limit.as_secs_f32()),
                    );
                    error!(kind = %failure.kind, detail = %failure.detail, "text generation failed");
                    return Err(failure);
                }
            },
            None => task.await,
        };

        joined.unwrap_or_else(|e| {
            let failure = GenerationFailure::new(FailureKind::Unknown, format!("generation task failed: {e}"));
            error!(kind = %failure.kind, detail = %failure.detail, "text generation failed");
            Err(failure)
        })
    }
}
