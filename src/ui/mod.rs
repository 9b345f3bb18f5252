//! UI components for PocketChat
//!
//! A single screen: a loading view until the model is ready, then the chat.

pub mod chat;
pub mod loading;
pub mod theme;

use crate::app::AppState;
use crate::inference::Phase;
use chat::ChatView;
use dioxus::prelude::*;
use loading::LoadingView;

#[component]
pub fn Layout() -> Element {
    let app_state = use_context::<AppState>();
    let has_session = matches!(*app_state.phase.read(), Phase::Ready | Phase::Streaming);
    let css = theme::stylesheet();

    rsx! {
        style { "{css}" }
        div { class: "container",
            div { class: "scroll-content",
                if has_session {
                    ChatView {}
                } else {
                    LoadingView {}
                }
            }
        }
    }
}
