//! LLM inference
//!
//! Session lifecycle, streaming completions, and the llama-cpp engine behind
//! them.

pub mod chat;
pub mod controller;
pub mod engine;
pub mod lifecycle;
pub mod llama;
pub mod prompt;
pub mod session;
pub mod streaming;

#[cfg(test)]
pub(crate) mod testing;

pub use chat::{ChatBackend, ChatSurface};
pub use controller::{build_request, StreamingController};
pub use lifecycle::{Event, Phase};
pub use llama::LlamaLoader;
pub use session::{Session, SessionManager};
pub use streaming::{CompletionHandle, StreamingBuffer};
