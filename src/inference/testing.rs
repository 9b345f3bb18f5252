//! Scripted engine and locator used by unit tests

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use async_trait::async_trait;

use crate::error::{GenerationError, InitializationError, LocateError};
use crate::inference::engine::{EngineHandle, EngineLoader, TokenSink};
use crate::storage::locator::ModelLocator;
use crate::types::completion::{CompletionRequest, EngineOutput, EngineStop};
use crate::types::config::SessionConfig;
use crate::types::progress::ProgressCallback;

#[derive(Clone, Debug, Default)]
pub struct Script {
    pieces: Vec<String>,
    final_text: Option<String>,
    token_limit: bool,
    failure: Option<String>,
}

impl Script {
    pub fn pieces(pieces: &[&str]) -> Self {
        Self {
            pieces: pieces.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Report this text as the engine's final output instead of the pieces
    pub fn with_final_text(mut self, text: &str) -> Self {
        self.final_text = Some(text.to_string());
        self
    }

    pub fn hitting_token_limit(mut self) -> Self {
        self.token_limit = true;
        self
    }

    /// Fail after all pieces were delivered
    pub fn failing_with(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }
}

pub struct ScriptedEngine {
    script: Script,
    consumed: Arc<AtomicUsize>,
    gate: Option<Mutex<mpsc::Receiver<()>>>,
}

impl ScriptedEngine {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            consumed: Arc::new(AtomicUsize::new(0)),
            gate: None,
        }
    }

    /// An engine that blocks in `complete` until the returned sender fires
    pub fn gated(script: Script) -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        let mut engine = Self::new(script);
        engine.gate = Some(Mutex::new(rx));
        (engine, tx)
    }

    /// Number of pieces handed to the sink so far
    pub fn pieces_consumed(&self) -> Arc<AtomicUsize> {
        self.consumed.clone()
    }
}

impl EngineHandle for ScriptedEngine {
    fn complete(
        &self,
        _request: &CompletionRequest,
        sink: &mut TokenSink<'_>,
    ) -> Result<EngineOutput, GenerationError> {
        if let Some(gate) = &self.gate {
            let rx = gate.lock().map_err(|_| GenerationError::new("gate poisoned"))?;
            let _ = rx.recv();
        }

        let mut text = String::new();
        let mut stop = if self.script.token_limit {
            EngineStop::TokenLimit
        } else {
            EngineStop::EndOfGeneration
        };
        let mut predicted = 0;
        for piece in &self.script.pieces {
            self.consumed.fetch_add(1, Ordering::SeqCst);
            predicted += 1;
            text.push_str(piece);
            if let ControlFlow::Break(()) = sink(piece) {
                stop = EngineStop::Halted;
                break;
            }
        }

        if let Some(message) = &self.script.failure {
            return Err(GenerationError::new(message.clone()));
        }

        Ok(EngineOutput {
            text: self.script.final_text.clone().unwrap_or(text),
            tokens_predicted: predicted,
            stop,
        })
    }
}

/// Loader that fails for paths listed in `reject` and counts loads. Loaded
/// engines play `script`.
#[derive(Default)]
pub struct ScriptedLoader {
    pub loads: AtomicUsize,
    pub reject: Mutex<Vec<PathBuf>>,
    pub script: Script,
}

impl ScriptedLoader {
    pub fn playing(script: Script) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }
}

impl EngineLoader for ScriptedLoader {
    fn load(
        &self,
        model_path: &Path,
        _config: &SessionConfig,
        progress: ProgressCallback,
    ) -> Result<Arc<dyn EngineHandle>, InitializationError> {
        progress(0);
        let rejected = self
            .reject
            .lock()
            .map(|list| list.iter().any(|p| p == model_path))
            .unwrap_or(false);
        if rejected {
            return Err(InitializationError::Rejected("unsupported model".to_string()));
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        progress(100);
        Ok(Arc::new(ScriptedEngine::new(self.script.clone())))
    }
}

/// Locator that hands out a sequence of prepared answers
pub struct ScriptedLocator {
    answers: Mutex<Vec<Result<PathBuf, String>>>,
    pub calls: AtomicUsize,
}

impl ScriptedLocator {
    pub fn new(answers: Vec<Result<PathBuf, String>>) -> Self {
        Self {
            answers: Mutex::new(answers),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ModelLocator for ScriptedLocator {
    async fn resolve(&self, progress: ProgressCallback) -> Result<PathBuf, LocateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        progress(50);
        progress(100);
        let next = {
            let mut answers = self.answers.lock().unwrap();
            if answers.is_empty() {
                None
            } else {
                Some(answers.remove(0))
            }
        };
        match next {
            Some(Ok(path)) => Ok(path),
            Some(Err(message)) => Err(LocateError::NotFound(message)),
            None => Err(LocateError::NotFound("no scripted answer".to_string())),
        }
    }
}
