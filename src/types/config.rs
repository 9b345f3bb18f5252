//! Configuration types
//!
//! Engine initialization and sampling parameters.

use serde::{Deserialize, Serialize};

/// Stop sequences applied when none are configured.
pub const DEFAULT_STOP: [&str; 3] = ["<|im_end|>", "<|im_start|>assistant", "\n"];

/// Parameters used to initialize an inference session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Context window size in tokens
    pub context_size: u32,
    /// Prompt processing batch size
    pub batch_size: u32,
    /// Worker threads (0 = pick from the host)
    pub threads: u32,
    /// Number of layers to offload to the GPU (0 = CPU only)
    pub gpu_layers: u32,
    /// Sampler seed
    pub seed: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            context_size: 2048,
            batch_size: 512,
            threads: 0,
            gpu_layers: 0,
            seed: 1234,
        }
    }
}

/// Sampling parameters for a single completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Maximum number of tokens to generate
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    /// Generation stops as soon as one of these is produced
    pub stop: Vec<String>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_tokens: 200,
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            stop: DEFAULT_STOP.iter().map(|s| s.to_string()).collect(),
        }
    }
}
