//! Chat interface components
//!
//! The streamed answer, the prompt input and the status line.

pub mod input;

use crate::app::{submit_prompt, AppState};
use crate::inference::{ChatSurface, Phase};
use dioxus::prelude::*;
use input::PromptInput;

#[component]
pub fn ChatView() -> Element {
    let app_state = use_context::<AppState>();
    let is_ready = app_state.phase.read().is_ready();
    let is_streaming = matches!(*app_state.phase.read(), Phase::Streaming);
    let is_busy = app_state.phase.read().is_busy();
    let streaming_text = app_state.streaming_text.read().clone();
    let status = app_state
        .status_log
        .read()
        .last()
        .cloned()
        .unwrap_or_default();

    let handle_send = {
        let app_state = app_state.clone();
        move |text: String| {
            let mut state = app_state.clone();
            spawn(async move {
                if let Err(e) = submit_prompt(state.clone(), text).await {
                    state.log(e.status_message());
                }
            });
        }
    };

    let mut restart_key = app_state.restart_key;
    let handle_restart = move |_: MouseEvent| restart_key.set(restart_key() + 1);

    rsx! {
        div { class: "chat-container",
            if !streaming_text.is_empty() {
                div { class: "message-text", "{streaming_text}" }
            }
            if is_streaming {
                span { class: "typing", "Generating..." }
            }
            p { class: "status-line", "{status}" }

            PromptInput {
                on_send: handle_send,
                ready: is_ready,
                draft: app_state.draft,
            }

            button {
                class: "button secondary",
                disabled: is_busy,
                onclick: handle_restart,
                "Restart model"
            }
        }
    }
}
