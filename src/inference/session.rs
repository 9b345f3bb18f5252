//! Inference session management
//!
//! Owns at most one loaded model. A restart always drops the current
//! session and runs location and initialization again from scratch.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::error::{ChatError, InitializationError, Result};
use crate::inference::engine::{EngineHandle, EngineLoader};
use crate::inference::lifecycle::{Event, Phase};
use crate::storage::locator::ModelLocator;
use crate::types::config::SessionConfig;
use crate::types::progress::{ProgressCallback, ProgressTracker};

/// A model loaded into the engine
pub struct Session {
    model_path: PathBuf,
    config: SessionConfig,
    engine: Arc<dyn EngineHandle>,
}

impl Session {
    pub fn new(model_path: PathBuf, config: SessionConfig, engine: Arc<dyn EngineHandle>) -> Self {
        Self {
            model_path,
            config,
            engine,
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn engine(&self) -> &dyn EngineHandle {
        self.engine.as_ref()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("model_path", &self.model_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

pub struct SessionManager {
    loader: Arc<dyn EngineLoader>,
    locator: Arc<dyn ModelLocator>,
    config: SessionConfig,
    session: Option<Arc<Session>>,
    phase: Phase,
}

impl SessionManager {
    pub fn new(
        loader: Arc<dyn EngineLoader>,
        locator: Arc<dyn ModelLocator>,
        config: SessionConfig,
    ) -> Self {
        Self {
            loader,
            locator,
            config,
            session: None,
            phase: Phase::Uninitialized,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.clone()
    }

    /// Swap the locator and engine parameters used by the next start.
    /// The current session, if any, keeps running until released.
    pub fn reconfigure(&mut self, locator: Arc<dyn ModelLocator>, config: SessionConfig) {
        self.locator = locator;
        self.config = config;
    }

    /// Load `model_path` into a new session
    pub async fn initialize(
        &mut self,
        model_path: PathBuf,
        progress: ProgressCallback,
    ) -> Result<Arc<Session>> {
        self.begin()?;
        let outcome = self.load(model_path, progress).await;
        self.settle(outcome)
    }

    /// Locate the model, then initialize it. `download` sees locate
    /// progress, `init` sees engine load progress.
    pub async fn start(
        &mut self,
        download: ProgressCallback,
        init: ProgressCallback,
    ) -> Result<Arc<Session>> {
        self.begin()?;
        tracing::info!("Resolving model path");
        let outcome = match self.locator.resolve(monotonic(download)).await {
            Ok(path) => self.load(path, init).await,
            Err(e) => Err(e.into()),
        };
        self.settle(outcome)
    }

    /// Tear everything down and start again
    pub async fn restart(
        &mut self,
        download: ProgressCallback,
        init: ProgressCallback,
    ) -> Result<Arc<Session>> {
        tracing::info!("Restarting inference session");
        self.release();
        self.start(download, init).await
    }

    /// Drop the current session; engine resources are freed once no
    /// completion holds it any more.
    pub fn release(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::info!("Releasing session for {:?}", session.model_path());
        }
        self.phase = Phase::Uninitialized;
    }

    fn begin(&mut self) -> Result<()> {
        self.phase = self.phase.apply(Event::BeginInit)?;
        self.session = None;
        Ok(())
    }

    fn settle(&mut self, outcome: Result<Arc<Session>>) -> Result<Arc<Session>> {
        match outcome {
            Ok(session) => {
                self.phase = self.phase.apply(Event::InitSucceeded)?;
                self.session = Some(session.clone());
                Ok(session)
            }
            Err(e) => {
                tracing::error!("Session initialization failed: {}", e);
                self.phase = self.phase.apply(Event::InitFailed(e.status_message()))?;
                Err(e)
            }
        }
    }

    async fn load(&self, model_path: PathBuf, progress: ProgressCallback) -> Result<Arc<Session>> {
        if !model_path.is_file() {
            return Err(InitializationError::ModelNotFound(model_path.display().to_string()).into());
        }

        let loader = self.loader.clone();
        let config = self.config.clone();
        let started = Instant::now();
        let engine = {
            let path = model_path.clone();
            let config = config.clone();
            tokio::task::spawn_blocking(move || {
                loader.load(&path, &config, monotonic(progress))
            })
            .await
            .map_err(|e| ChatError::from(InitializationError::Task(e.to_string())))??
        };

        tracing::info!(
            "Model initialized in {} ms: {:?}",
            started.elapsed().as_millis(),
            model_path
        );
        Ok(Arc::new(Session::new(model_path, config, engine)))
    }
}

/// Route raw engine reports through a [`ProgressTracker`]
fn monotonic(progress: ProgressCallback) -> ProgressCallback {
    let tracker = Mutex::new(ProgressTracker::new(progress));
    Arc::new(move |value| {
        if let Ok(mut tracker) = tracker.lock() {
            tracker.report(f64::from(value));
        }
    })
}
