//! llama.cpp backend, built on `llama-cpp-2`.

use std::num::NonZeroU32;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::anyhow;
use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;
use tracing::{debug, info};

use crate::backend::{
    BackendError, Completion, CompletionRequest, FinishReason, ModelBackend, ModelLoader,
    RuntimeOptions,
};
use crate::stop::find_stop;

/// llama.cpp picks a random seed when given this value.
const RANDOM_SEED: u32 = 0xFFFF_FFFF;

/// The llama.cpp backend may only be initialised once per process.
static BACKEND: Mutex<Option<Arc<LlamaBackend>>> = Mutex::new(None);

fn shared_backend() -> Result<Arc<LlamaBackend>, BackendError> {
    let mut slot = BACKEND.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(backend) = slot.as_ref() {
        return Ok(Arc::clone(backend));
    }

    let backend = Arc::new(
        LlamaBackend::init().map_err(|e| anyhow!("failed to initialise llama.cpp: {e}"))?,
    );
    *slot = Some(Arc::clone(&backend));
    Ok(backend)
}

/// Loads GGUF models from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LlamaLoader;

impl LlamaLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ModelLoader for LlamaLoader {
    fn load(
        &self,
        model_path: &Path,
        options: &RuntimeOptions,
    ) -> Result<Arc<dyn ModelBackend>, BackendError> {
        if !model_path.is_file() {
            return Err(BackendError::ModelNotFound {
                path: model_path.to_path_buf(),
            });
        }

        let backend = shared_backend()?;
        let params = LlamaModelParams::default().with_n_gpu_layers(options.n_gpu_layers);
        let model = LlamaModel::load_from_file(&backend, model_path, &params).map_err(|e| {
            BackendError::InvalidModel {
                path: model_path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        info!(
            model_path = %model_path.display(),
            n_params = model.n_params(),
            n_ctx_train = model.n_ctx_train(),
            chat_format = %options.chat_format,
            "llama model loaded"
        );

        Ok(Arc::new(LlamaCompletion {
            backend,
            model,
            options: options.clone(),
        }))
    }
}

struct LlamaCompletion {
    backend: Arc<LlamaBackend>,
    model: LlamaModel,
    options: RuntimeOptions,
}

impl LlamaCompletion {
    fn sampler(&self, request: &CompletionRequest) -> LlamaSampler {
        let seed = request.seed.unwrap_or(RANDOM_SEED);
        if request.temperature <= 0.0 {
            return LlamaSampler::greedy();
        }
        LlamaSampler::chain_simple([
            LlamaSampler::top_k(request.top_k.min(i32::MAX as u32) as i32),
            LlamaSampler::top_p(request.top_p, 1),
            LlamaSampler::temp(request.temperature),
            LlamaSampler::dist(seed),
        ])
    }
}

impl ModelBackend for LlamaCompletion {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion, BackendError> {
        let n_ctx = self.options.context_window;
        let n_batch = self.options.batch_size.max(1);

        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(n_ctx))
            .with_n_batch(n_batch)
            .with_n_threads(self.options.threads)
            .with_n_threads_batch(self.options.threads);
        let mut ctx = self
            .model
            .new_context(&self.backend, ctx_params)
            .map_err(|e| BackendError::Execution(format!("failed to create context: {e}")))?;

        let tokens = self
            .model
            .str_to_token(&request.prompt, AddBos::Always)
            .map_err(|e| BackendError::Execution(format!("failed to tokenize prompt: {e}")))?;
        if tokens.len() >= n_ctx as usize {
            return Err(BackendError::ContextExceeded {
                prompt_tokens: tokens.len(),
                context_window: n_ctx,
            });
        }
        debug!(prompt_tokens = tokens.len(), "prompt tokenized");

        // Prefill in batch-sized chunks; only the final token needs logits.
        let mut batch = LlamaBatch::new(n_batch as usize, 1);
        let last = tokens.len().saturating_sub(1);
        for (chunk_idx, chunk) in tokens.chunks(n_batch as usize).enumerate() {
            batch.clear();
            for (offset, token) in chunk.iter().enumerate() {
                let pos = chunk_idx * n_batch as usize + offset;
                batch
                    .add(*token, pos as i32, &[0], pos == last)
                    .map_err(|e| BackendError::Execution(format!("failed to fill batch: {e}")))?;
            }
            ctx.decode(&mut batch)
                .map_err(|e| BackendError::Execution(format!("failed to decode prompt: {e}")))?;
        }

        let mut sampler = self.sampler(request);
        let mut text = if request.echo { request.prompt.clone() } else { String::new() };
        let generated_from = text.len();
        let mut pending: Vec<u8> = Vec::new();
        let mut n_cur = tokens.len() as i32;
        let mut finish_reason = FinishReason::Length;

        for _ in 0..request.max_tokens {
            if n_cur as u32 >= n_ctx {
                break;
            }

            let token = sampler.sample(&ctx, batch.n_tokens() - 1);
            sampler.accept(token);

            if self.model.is_eog_token(token) {
                finish_reason = FinishReason::Stop;
                break;
            }

            let bytes = self
                .model
                .token_to_bytes(token, Special::Tokenize)
                .map_err(|e| BackendError::Execution(format!("failed to detokenize: {e}")))?;
            pending.extend_from_slice(&bytes);
            drain_utf8(&mut pending, &mut text);

            if let Some(at) = find_stop(&text[generated_from..], &request.stop_sequences) {
                text.truncate(generated_from + at);
                finish_reason = FinishReason::Stop;
                break;
            }

            batch.clear();
            batch
                .add(token, n_cur, &[0], true)
                .map_err(|e| BackendError::Execution(format!("failed to fill batch: {e}")))?;
            ctx.decode(&mut batch)
                .map_err(|e| BackendError::Execution(format!("failed to decode: {e}")))?;
            n_cur += 1;
        }

        if !pending.is_empty() {
            text.push_str(&String::from_utf8_lossy(&pending));
            if let Some(at) = find_stop(&text[generated_from..], &request.stop_sequences) {
                text.truncate(generated_from + at);
            }
        }

        debug!(
            generated_tokens = n_cur - tokens.len() as i32,
            %finish_reason,
            "llama completion finished"
        );
        Ok(Completion::single(text, finish_reason))
    }
}

/// Move the complete UTF-8 prefix of `pending` into `text`. An incomplete
/// trailing sequence stays in `pending`; invalid bytes are replaced.
fn drain_utf8(pending: &mut Vec<u8>, text: &mut String) {
    loop {
        match std::str::from_utf8(pending) {
            Ok(s) => {
                text.push_str(s);
                pending.clear();
                return;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                text.push_str(&String::from_utf8_lossy(&pending[..valid]));
                match e.error_len() {
                    // Replace only the bad sequence; what follows may be a
                    // char still waiting for its tail.
                    Some(len) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        pending.drain(..valid + len);
                    }
                    None => {
                        pending.drain(..valid);
                        return;
                    }
                }
            }
        }
    }
}
