//! Error taxonomy
//!
//! One error type per phase of the chat lifecycle, wrapped by [`ChatError`]
//! for callers that drive the whole flow.

use thiserror::Error;

use crate::inference::lifecycle::LifecycleError;

/// The model weight file could not be resolved to a local path.
#[derive(Error, Debug)]
pub enum LocateError {
    #[error("invalid model reference: {0}")]
    InvalidReference(String),

    #[error("no model file available in {0}")]
    NotFound(String),

    #[error("model download failed: {0}")]
    Download(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The engine failed to load or configure the model.
#[derive(Error, Debug)]
pub enum InitializationError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),

    #[error("engine rejected the model: {0}")]
    Rejected(String),

    #[error("initialization task failed: {0}")]
    Task(String),
}

/// Failure in the middle of a completion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("generation failed: {message}")]
pub struct GenerationError {
    pub message: String,
}

impl GenerationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error(transparent)]
    Initialization(#[from] InitializationError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("a completion is already in progress")]
    Busy,

    #[error("no model session is ready")]
    NotReady,

    #[error("prompt is empty")]
    EmptyPrompt,
}

impl ChatError {
    /// Status line shown to the user for this error.
    pub fn status_message(&self) -> String {
        match self {
            ChatError::Locate(e) => format!("Could not find the model: {e}"),
            ChatError::Initialization(e) => format!("Could not initialize the model: {e}"),
            ChatError::Generation(e) => format!("Generation error: {}", e.message),
            ChatError::Lifecycle(e) => format!("Unexpected state: {e}"),
            ChatError::Busy => "Please wait for the current answer to finish.".to_string(),
            ChatError::NotReady => "The model is not ready yet.".to_string(),
            ChatError::EmptyPrompt => "Type a prompt first.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
