//! Root Dioxus application component
//!
//! Holds the explicit application state shared through context. The flows
//! themselves live in [`ChatBackend`]; this module binds them to signals.

use crate::error::ChatError;
use crate::inference::{ChatBackend, ChatSurface, LlamaLoader, Phase, SessionManager};
use crate::storage::locator::{HubLocator, ModelLocator};
use crate::storage::settings::{load_settings, AppSettings};
use crate::system::hardware::HardwareProfile;
use crate::types::completion::CompletionResult;
use crate::types::config::SessionConfig;
use crate::ui::Layout;
use chrono::Local;
use dioxus::prelude::*;
use std::sync::Arc;

/// Global application state shared across components
#[derive(Clone)]
pub struct AppState {
    pub backend: ChatBackend,
    pub settings: Signal<AppSettings>,
    pub phase: Signal<Phase>,
    /// Model download progress in percent, while locating
    pub download_progress: Signal<Option<u8>>,
    /// Text of the current (or last) completion
    pub streaming_text: Signal<String>,
    /// Prompt being typed; kept until it has been answered
    pub draft: Signal<String>,
    pub status_log: Signal<Vec<String>>,
    /// Bumped to re-run location and initialization from scratch
    pub restart_key: Signal<u32>,
}

/// Locator and engine parameters derived from `settings`
fn engine_setup(settings: &AppSettings) -> (Arc<dyn ModelLocator>, SessionConfig) {
    let locator = HubLocator::new(
        settings.model_path.clone(),
        settings.models_directory.clone(),
        settings.model_source.clone(),
    );
    (Arc::new(locator), settings.session_config(&HardwareProfile::detect()))
}

impl AppState {
    pub fn new() -> Self {
        let settings = load_settings();
        let (locator, config) = engine_setup(&settings);
        let sessions = SessionManager::new(Arc::new(LlamaLoader::new()), locator, config);
        tracing::info!("AppState initialized");

        Self {
            backend: ChatBackend::new(sessions),
            settings: Signal::new(settings),
            phase: Signal::new(Phase::Uninitialized),
            download_progress: Signal::new(None),
            streaming_text: Signal::new(String::new()),
            draft: Signal::new(String::new()),
            status_log: Signal::new(Vec::new()),
            restart_key: Signal::new(0),
        }
    }

    /// Re-read settings from disk so a restart picks up edits
    async fn reload_settings(&mut self) {
        let settings = load_settings();
        let (locator, config) = engine_setup(&settings);
        self.backend.sessions.lock().await.reconfigure(locator, config);
        self.settings.set(settings);
    }
}

impl ChatSurface for AppState {
    fn phase(&self) -> Phase {
        self.phase.read().clone()
    }

    fn set_phase(&mut self, phase: Phase) {
        self.phase.set(phase);
    }

    fn set_progress(&mut self, percent: Option<u8>) {
        self.download_progress.set(percent);
    }

    fn set_text(&mut self, text: &str) {
        self.streaming_text.set(text.to_string());
    }

    fn append_text(&mut self, chunk: &str) {
        self.streaming_text.write().push_str(chunk);
    }

    fn clear_draft(&mut self) {
        self.draft.set(String::new());
    }

    /// Append a timestamped line to the status log
    fn log(&mut self, message: String) {
        tracing::info!("{}", message);
        self.status_log
            .write()
            .push(format!("[{}] {}", Local::now().format("%H:%M:%S"), message));
    }
}

/// Locate and load the model, reflecting progress and outcome in the state
pub async fn initialize_session(mut state: AppState, restart: bool) {
    if restart {
        state.reload_settings().await;
    }
    let backend = state.backend.clone();
    if let Err(e) = backend.initialize(&mut state, restart).await {
        tracing::debug!("Session start-up ended with: {}", e);
    }
}

/// Run one prompt through the model, streaming into `streaming_text`
pub async fn submit_prompt(mut state: AppState, input: String) -> Result<CompletionResult, ChatError> {
    let (system_prompt, sampling) = {
        let settings = state.settings.read();
        (settings.system_prompt.clone(), settings.sampling())
    };
    let backend = state.backend.clone();
    backend
        .submit(&mut state, &input, &system_prompt, &sampling)
        .await
}

#[component]
pub fn App() -> Element {
    let app_state = use_context_provider(AppState::new);

    {
        let app_state = app_state.clone();
        use_effect(move || {
            let key = *app_state.restart_key.read();
            let state = app_state.clone();
            spawn(async move {
                initialize_session(state, key > 0).await;
            });
        });
    }

    rsx! {
        Layout {}
    }
}
