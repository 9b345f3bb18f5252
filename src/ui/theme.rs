//! Visual theme
//!
//! Palette, spacing and type scale, rendered into the stylesheet injected by
//! [`crate::ui::Layout`].

pub mod colors {
    pub const PRIMARY: &str = "#4A90E2";
    pub const ACCENT: &str = "#FFD700";
    pub const BACKGROUND: &str = "#F5F5F5";
    pub const TEXT_PRIMARY: &str = "#333333";
    pub const TEXT_SECONDARY: &str = "#666666";
    pub const ERROR: &str = "#F44336";
    pub const CARD_BACKGROUND: &str = "#FFFFFF";
    pub const INPUT_BORDER: &str = "#D0D0D0";
    pub const BUTTON_TEXT: &str = "#FFFFFF";
}

pub mod spacing {
    pub const SMALL: u32 = 8;
    pub const MEDIUM: u32 = 16;
    pub const LARGE: u32 = 24;
}

pub mod radius {
    pub const SMALL: u32 = 8;
    pub const MEDIUM: u32 = 16;
    pub const LARGE: u32 = 25;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextStyle {
    pub size: u32,
    pub weight: &'static str,
    pub color: &'static str,
}

impl TextStyle {
    fn css(&self) -> String {
        format!(
            "font-size: {}px; font-weight: {}; color: {};",
            self.size, self.weight, self.color
        )
    }
}

pub const H1: TextStyle = TextStyle {
    size: 28,
    weight: "bold",
    color: colors::TEXT_PRIMARY,
};

pub const BODY: TextStyle = TextStyle {
    size: 16,
    weight: "normal",
    color: colors::TEXT_PRIMARY,
};

pub const SMALL: TextStyle = TextStyle {
    size: 12,
    weight: "normal",
    color: colors::TEXT_SECONDARY,
};

/// Stylesheet for the whole app
pub fn stylesheet() -> String {
    use colors::*;

    format!(
        r#"
html, body {{ margin: 0; height: 100%; font-family: system-ui, sans-serif; }}
.container {{ display: flex; flex-direction: column; min-height: 100vh; background: {BACKGROUND}; }}
.scroll-content {{ flex-grow: 1; display: flex; flex-direction: column; justify-content: space-between; padding: {m}px; overflow-y: auto; }}
.loading-container {{ flex: 1; display: flex; flex-direction: column; justify-content: center; align-items: center; }}
.spinner {{ width: 36px; height: 36px; border: 4px solid {INPUT_BORDER}; border-top-color: {PRIMARY}; border-radius: 50%; animation: spin 1s linear infinite; }}
@keyframes spin {{ to {{ transform: rotate(360deg); }} }}
.h1 {{ {h1} }}
.body-text {{ {body} margin-top: {m}px; color: {TEXT_SECONDARY}; }}
.small-text {{ {small} margin-top: {s}px; }}
.error-text {{ {body} margin-top: {m}px; color: {ERROR}; text-align: center; }}
.chat-container {{ flex: 1; display: flex; flex-direction: column; justify-content: flex-end; }}
.message-text {{ {body} background: {CARD_BACKGROUND}; border-radius: {rm}px; padding: {m}px; margin-bottom: {s}px; align-self: flex-start; max-width: 80%; white-space: pre-wrap; }}
.typing {{ {small} margin-bottom: {s}px; color: {ACCENT}; }}
.status-line {{ {small} margin: 0 0 {s}px 0; }}
.input-container {{ display: flex; flex-direction: row; align-items: center; padding-top: {m}px; border-top: 1px solid {INPUT_BORDER}; }}
.text-input {{ flex: 1; height: 50px; box-sizing: border-box; border: 1px solid {INPUT_BORDER}; border-radius: {rm}px; padding: 0 {m}px; margin-right: {s}px; background: {CARD_BACKGROUND}; {body} }}
.button {{ background: {PRIMARY}; color: {BUTTON_TEXT}; border: none; border-radius: {rs}px; padding: {s}px {m}px; font-size: {bs}px; cursor: pointer; }}
.button:disabled {{ opacity: 0.4; cursor: not-allowed; }}
.button.secondary {{ background: transparent; color: {PRIMARY}; margin-top: {s}px; border-radius: {rl}px; }}
.section {{ margin-top: {l}px; }}
"#,
        s = spacing::SMALL,
        m = spacing::MEDIUM,
        l = spacing::LARGE,
        rs = radius::SMALL,
        rm = radius::MEDIUM,
        rl = radius::LARGE,
        bs = BODY.size,
        h1 = H1.css(),
        body = BODY.css(),
        small = SMALL.css(),
    )
}
