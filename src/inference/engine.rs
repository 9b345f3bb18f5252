//! Native engine boundary
//!
//! Both calls are blocking; callers run them on tokio's blocking pool.

use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;

use crate::error::{GenerationError, InitializationError};
use crate::types::completion::{CompletionRequest, EngineOutput};
use crate::types::config::SessionConfig;
use crate::types::progress::ProgressCallback;

/// Receives each decoded text piece in generation order.
/// Returning `Break` asks the engine to stop after this piece.
pub type TokenSink<'a> = dyn FnMut(&str) -> ControlFlow<()> + 'a;

/// An initialized inference context bound to one loaded model
pub trait EngineHandle: Send + Sync {
    fn complete(
        &self,
        request: &CompletionRequest,
        sink: &mut TokenSink<'_>,
    ) -> Result<EngineOutput, GenerationError>;
}

/// Loads a model file into a fresh engine handle
pub trait EngineLoader: Send + Sync {
    fn load(
        &self,
        model_path: &Path,
        config: &SessionConfig,
        progress: ProgressCallback,
    ) -> Result<Arc<dyn EngineHandle>, InitializationError>;
}
