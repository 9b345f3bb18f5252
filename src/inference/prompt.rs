//! ChatML prompt template

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are Qwen, created by Alibaba Cloud. You are a helpful assistant.";

/// Wrap a raw user message in the system/user/assistant turn markup
pub fn format_prompt(system: &str, user: &str) -> String {
    format!(
        "<|im_start|>system\n{system}<|im_end|>\n<|im_start|>user\n{user}<|im_end|>\n<|im_start|>assistant\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_prompt() {
        let prompt = format_prompt(DEFAULT_SYSTEM_PROMPT, "Hello");
        assert_eq!(
            prompt,
            "<|im_start|>system\nYou are Qwen, created by Alibaba Cloud. You are a helpful assistant.<|im_end|>\n\
             <|im_start|>user\nHello<|im_end|>\n<|im_start|>assistant\n"
        );
    }

    #[test]
    fn test_user_text_is_kept_verbatim() {
        let prompt = format_prompt("sys", "  two\nlines ");
        assert!(prompt.contains("<|im_start|>user\n  two\nlines <|im_end|>"));
        assert!(prompt.ends_with("<|im_start|>assistant\n"));
    }
}
