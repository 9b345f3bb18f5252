//! llama.cpp backed engine
//!
//! The backend is process-global in llama.cpp, so the loader initializes it
//! once and shares it with every model it loads. Each completion gets its
//! own context; nothing is carried over between requests.

use std::num::NonZeroU32;
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::{Arc, Mutex};

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;

use crate::error::{GenerationError, InitializationError};
use crate::inference::engine::{EngineHandle, EngineLoader, TokenSink};
use crate::types::completion::{CompletionRequest, EngineOutput, EngineStop};
use crate::types::config::{SamplingParams, SessionConfig};
use crate::types::progress::ProgressCallback;

#[derive(Default)]
pub struct LlamaLoader {
    backend: Mutex<Option<Arc<LlamaBackend>>>,
}

impl LlamaLoader {
    pub fn new() -> Self {
        Self::default()
    }

    fn backend(&self) -> Result<Arc<LlamaBackend>, InitializationError> {
        let mut slot = self
            .backend
            .lock()
            .map_err(|_| InitializationError::Rejected("backend lock poisoned".to_string()))?;
        if let Some(backend) = slot.as_ref() {
            return Ok(backend.clone());
        }
        let backend = LlamaBackend::init().map_err(|e| InitializationError::Rejected(e.to_string()))?;
        let backend = Arc::new(backend);
        *slot = Some(backend.clone());
        tracing::info!("llama.cpp backend initialized");
        Ok(backend)
    }
}

impl EngineLoader for LlamaLoader {
    fn load(
        &self,
        model_path: &Path,
        config: &SessionConfig,
        progress: ProgressCallback,
    ) -> Result<Arc<dyn EngineHandle>, InitializationError> {
        progress(0);
        let backend = self.backend()?;

        let model_params = LlamaModelParams::default().with_n_gpu_layers(config.gpu_layers);
        tracing::info!(
            "Loading model {:?} (gpu_layers={}, n_ctx={})",
            model_path,
            config.gpu_layers,
            config.context_size
        );
        let model = LlamaModel::load_from_file(&backend, model_path, &model_params)
            .map_err(|e| InitializationError::Rejected(e.to_string()))?;

        // Fail here rather than on the first prompt if the context cannot be created.
        model
            .new_context(&backend, context_params(config))
            .map_err(|e| InitializationError::Rejected(e.to_string()))?;

        progress(100);
        Ok(Arc::new(LlamaHandle {
            backend,
            model: Arc::new(model),
            config: config.clone(),
        }))
    }
}

pub struct LlamaHandle {
    backend: Arc<LlamaBackend>,
    model: Arc<LlamaModel>,
    config: SessionConfig,
}

fn context_params(config: &SessionConfig) -> LlamaContextParams {
    let mut params = LlamaContextParams::default()
        .with_n_ctx(NonZeroU32::new(config.context_size))
        .with_n_batch(config.batch_size);
    if config.threads > 0 {
        let threads = i32::try_from(config.threads).unwrap_or(i32::MAX);
        params = params.with_n_threads(threads).with_n_threads_batch(threads);
    }
    params
}

fn build_sampler(params: &SamplingParams, seed: u32) -> LlamaSampler {
    if params.temperature <= 0.0 {
        return LlamaSampler::greedy();
    }
    LlamaSampler::chain_simple([
        LlamaSampler::top_k(i32::try_from(params.top_k).unwrap_or(i32::MAX)),
        LlamaSampler::top_p(params.top_p, 1),
        LlamaSampler::temp(params.temperature),
        LlamaSampler::dist(seed),
    ])
}

fn generation_error(e: impl std::fmt::Display) -> GenerationError {
    GenerationError::new(e.to_string())
}

/// Take the longest valid UTF-8 prefix out of `pending`, keeping an
/// incomplete trailing sequence for the next token.
pub(crate) fn take_utf8(pending: &mut Vec<u8>) -> String {
    match std::str::from_utf8(pending) {
        Ok(text) => {
            let text = text.to_string();
            pending.clear();
            text
        }
        Err(e) if e.error_len().is_none() => {
            let valid = e.valid_up_to();
            let text = String::from_utf8_lossy(&pending[..valid]).into_owned();
            pending.drain(..valid);
            text
        }
        Err(_) => {
            let text = String::from_utf8_lossy(pending).into_owned();
            pending.clear();
            text
        }
    }
}

impl EngineHandle for LlamaHandle {
    fn complete(
        &self,
        request: &CompletionRequest,
        sink: &mut TokenSink<'_>,
    ) -> Result<EngineOutput, GenerationError> {
        let mut ctx = self
            .model
            .new_context(&self.backend, context_params(&self.config))
            .map_err(generation_error)?;

        let tokens = self
            .model
            .str_to_token(&request.prompt, AddBos::Always)
            .map_err(generation_error)?;
        if tokens.is_empty() {
            return Err(GenerationError::new("prompt produced no tokens"));
        }
        let n_ctx = self.config.context_size as usize;
        if tokens.len() >= n_ctx {
            return Err(GenerationError::new(format!(
                "prompt is {} tokens, context window is {}",
                tokens.len(),
                n_ctx
            )));
        }

        let n_batch = self.config.batch_size.max(1) as usize;
        let mut batch = LlamaBatch::new(n_batch, 1);
        let last = tokens.len() - 1;
        for (chunk_index, chunk) in tokens.chunks(n_batch).enumerate() {
            batch.clear();
            for (offset, token) in chunk.iter().enumerate() {
                let pos = chunk_index * n_batch + offset;
                batch
                    .add(*token, pos as i32, &[0], pos == last)
                    .map_err(generation_error)?;
            }
            ctx.decode(&mut batch).map_err(generation_error)?;
        }

        let mut sampler = build_sampler(&request.sampling, self.config.seed);
        let mut n_cur = tokens.len() as i32;
        let mut text = String::new();
        let mut pending: Vec<u8> = Vec::new();
        let mut predicted = 0u32;

        let stop = loop {
            if predicted >= request.sampling.max_tokens || n_cur as usize >= n_ctx {
                break EngineStop::TokenLimit;
            }

            let token = sampler.sample(&ctx, batch.n_tokens() - 1);
            sampler.accept(token);
            if self.model.is_eog_token(token) {
                break EngineStop::EndOfGeneration;
            }
            predicted += 1;

            let bytes = self
                .model
                .token_to_bytes(token, Special::Tokenize)
                .map_err(generation_error)?;
            pending.extend_from_slice(&bytes);
            let piece = take_utf8(&mut pending);
            if !piece.is_empty() {
                text.push_str(&piece);
                if let ControlFlow::Break(()) = sink(&piece) {
                    break EngineStop::Halted;
                }
            }

            batch.clear();
            batch.add(token, n_cur, &[0], true).map_err(generation_error)?;
            n_cur += 1;
            ctx.decode(&mut batch).map_err(generation_error)?;
        };

        if stop != EngineStop::Halted && !pending.is_empty() {
            let tail = String::from_utf8_lossy(&pending).into_owned();
            text.push_str(&tail);
            let _ = sink(&tail);
        }

        tracing::debug!(
            "request {} finished: {:?} after {} tokens",
            request.id,
            stop,
            predicted
        );
        Ok(EngineOutput {
            text,
            tokens_predicted: predicted,
            stop,
        })
    }
}
