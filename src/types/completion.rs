//! Completion types
//!
//! Requests submitted to the engine and the results they resolve with.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::config::SamplingParams;

/// A single prompt completion. Immutable once submitted.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub id: Uuid,
    /// Prompt already wrapped in the chat template
    pub prompt: String,
    pub sampling: SamplingParams,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, sampling: SamplingParams) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            sampling,
        }
    }
}

/// Why the engine itself stopped producing tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStop {
    /// The model emitted an end-of-generation token
    EndOfGeneration,
    /// `max_tokens` was reached
    TokenLimit,
    /// The caller asked the engine to halt
    Halted,
}

/// What the engine reports once a completion ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    /// The engine's own view of the generated text
    pub text: String,
    pub tokens_predicted: u32,
    pub stop: EngineStop,
}

/// Why a completion ended, as seen by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    EndOfGeneration,
    MaxTokens,
    /// A configured stop sequence was produced; it is excluded from the text
    StopSequence(String),
}

/// Final value of a completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub text: String,
    pub stop_reason: StopReason,
    pub tokens_predicted: u32,
    pub elapsed_ms: u64,
}
