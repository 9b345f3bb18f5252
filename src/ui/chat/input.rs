//! Prompt input: a single-line field and a send button

use dioxus::prelude::*;

/// Whether the send control is enabled
pub fn can_submit(ready: bool, text: &str) -> bool {
    ready && !text.trim().is_empty()
}

/// `draft` is owned by the caller, which clears it once the prompt has been
/// answered so a failed submission can be retried.
#[component]
pub fn PromptInput(on_send: EventHandler<String>, ready: bool, draft: Signal<String>) -> Element {
    let mut text = draft;

    let handle_keydown = move |evt: KeyboardEvent| {
        if evt.key() == Key::Enter {
            evt.prevent_default();
            if can_submit(ready, &text()) {
                on_send.call(text());
            }
        }
    };

    let enabled = can_submit(ready, &text());

    rsx! {
        div { class: "input-container",
            input {
                class: "text-input",
                r#type: "text",
                placeholder: "Type your prompt here...",
                value: "{text}",
                disabled: !ready,
                oninput: move |evt| text.set(evt.value()),
                onkeydown: handle_keydown,
            }
            button {
                class: "button",
                disabled: !enabled,
                onclick: move |_| {
                    if can_submit(ready, &text()) {
                        on_send.call(text());
                    }
                },
                "Send"
            }
        }
    }
}
