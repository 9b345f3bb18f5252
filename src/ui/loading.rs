//! Loading and failure view shown until a session is ready

use crate::app::AppState;
use crate::inference::Phase;
use dioxus::prelude::*;

#[component]
pub fn LoadingView() -> Element {
    let app_state = use_context::<AppState>();
    let phase = app_state.phase.read().clone();
    let progress = *app_state.download_progress.read();
    let mut restart_key = app_state.restart_key;

    let failure = match &phase {
        Phase::Failed(message) => Some(message.clone()),
        _ => None,
    };
    let is_failed = failure.is_some();
    let failure_text = failure.unwrap_or_default();
    let progress_text = match progress {
        Some(percent) if percent > 0 => format!("Download progress: {percent}%"),
        _ => String::new(),
    };

    rsx! {
        div { class: "loading-container",
            if is_failed {
                span { class: "h1", "Model unavailable" }
                p { class: "error-text", "{failure_text}" }
                button {
                    class: "button section",
                    onclick: move |_| restart_key.set(restart_key() + 1),
                    "Restart"
                }
            } else {
                div { class: "spinner" }
                span { class: "body-text", "Initializing model..." }
                if !progress_text.is_empty() {
                    span { class: "small-text", "{progress_text}" }
                }
            }
        }
    }
}
