//! Chat flows
//!
//! Session start-up and prompt submission, written against a [`ChatSurface`]
//! so the same code drives the dioxus signals and the unit tests.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{watch, Mutex};

use crate::error::{ChatError, Result};
use crate::inference::controller::{build_request, StreamingController};
use crate::inference::lifecycle::{Event, LifecycleError, Phase};
use crate::inference::session::{Session, SessionManager};
use crate::inference::streaming::StreamingBuffer;
use crate::types::completion::CompletionResult;
use crate::types::config::SamplingParams;
use crate::types::progress::{no_progress, ProgressCallback};

/// Where the flows read the phase from and publish their results
pub trait ChatSurface {
    fn phase(&self) -> Phase;
    fn set_phase(&mut self, phase: Phase);
    fn set_progress(&mut self, percent: Option<u8>);
    fn set_text(&mut self, text: &str);
    fn append_text(&mut self, chunk: &str);
    /// Called once a prompt has been answered
    fn clear_draft(&mut self);
    fn log(&mut self, message: String);

    fn transition(&mut self, event: Event) -> std::result::Result<(), LifecycleError> {
        let next = self.phase().apply(event)?;
        self.set_phase(next);
        Ok(())
    }
}

/// Session manager plus completion controller, shared by every flow
#[derive(Clone)]
pub struct ChatBackend {
    pub sessions: Arc<Mutex<SessionManager>>,
    pub controller: Arc<StreamingController>,
}

impl ChatBackend {
    pub fn new(sessions: SessionManager) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(sessions)),
            controller: Arc::new(StreamingController::new()),
        }
    }

    /// Locate and load the model, publishing download progress as it arrives
    pub async fn initialize<S: ChatSurface>(
        &self,
        surface: &mut S,
        restart: bool,
    ) -> Result<Arc<Session>> {
        surface.transition(Event::BeginInit)?;
        surface.set_progress(None);
        surface.set_text("");
        surface.log("Resolving model path...".to_string());

        // Progress arrives from other threads; hop it onto this task.
        let (tx, mut rx) = watch::channel(None::<u8>);
        let download: ProgressCallback = Arc::new(move |percent: u8| {
            let _ = tx.send(Some(percent));
        });

        let started = Instant::now();
        let sessions = self.sessions.clone();
        let init = async move {
            let mut sessions = sessions.lock().await;
            if restart {
                sessions.restart(download, no_progress()).await
            } else {
                sessions.start(download, no_progress()).await
            }
        };
        let listen = async {
            while rx.changed().await.is_ok() {
                let value = *rx.borrow_and_update();
                surface.set_progress(value);
            }
        };
        // The listener ends once the init flow drops the download callback.
        let (outcome, ()) = tokio::join!(init, listen);

        match outcome {
            Ok(session) => {
                surface.log(format!(
                    "Model initialized in {} ms: {} (context {})",
                    started.elapsed().as_millis(),
                    session.model_path().display(),
                    session.config().context_size
                ));
                surface.transition(Event::InitSucceeded)?;
                Ok(session)
            }
            Err(e) => {
                let message = e.status_message();
                surface.log(message.clone());
                surface.transition(Event::InitFailed(message))?;
                Err(e)
            }
        }
    }

    /// Run one prompt through the model, streaming into the surface text
    pub async fn submit<S: ChatSurface>(
        &self,
        surface: &mut S,
        input: &str,
        system_prompt: &str,
        sampling: &SamplingParams,
    ) -> Result<CompletionResult> {
        if !surface.phase().is_ready() {
            return Err(ChatError::NotReady);
        }
        let request = build_request(input, system_prompt, sampling)?;
        let session = self
            .sessions
            .lock()
            .await
            .session()
            .ok_or(ChatError::NotReady)?;

        surface.transition(Event::Submit)?;
        let mut handle = match self.controller.submit(session, request) {
            Ok(handle) => handle,
            Err(e) => {
                surface.transition(Event::Finished)?;
                return Err(e);
            }
        };
        let id = handle.id();

        let mut buffer = StreamingBuffer::new();
        surface.set_text("");
        while let Some(chunk) = handle.next_chunk().await {
            buffer.append(&chunk);
            surface.append_text(&chunk);
        }
        let outcome = handle.finish().await;
        surface.transition(Event::Finished)?;

        let result = outcome?;
        if buffer.reconcile(&result.text) {
            surface.set_text(buffer.text());
        }
        surface.clear_draft();
        surface.log(format!(
            "Completion {} finished: {} tokens in {} ms",
            id, result.tokens_predicted, result.elapsed_ms
        ));
        Ok(result)
    }
}
