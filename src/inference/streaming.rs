//! Streaming completion plumbing
//!
//! Stop-sequence scanning over raw engine pieces, the display buffer, and
//! the handle through which callers consume a running completion.

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::GenerationError;
use crate::types::completion::CompletionResult;

/// Messages sent from the generation task to the handle
#[derive(Debug)]
pub enum StreamToken {
    /// New text, appended to what was sent before
    Chunk(String),
    Done(CompletionResult),
    Error(GenerationError),
}

/// Withholds text that may be the start of a stop sequence until it is
/// known not to be one, and cuts the stream at the first stop sequence.
#[derive(Debug)]
pub struct StopScanner {
    stops: Vec<String>,
    pending: String,
    hit: Option<String>,
}

impl StopScanner {
    pub fn new(stops: &[String]) -> Self {
        Self {
            stops: stops.iter().filter(|s| !s.is_empty()).cloned().collect(),
            pending: String::new(),
            hit: None,
        }
    }

    /// Feed a raw piece; returns the text that is now safe to display.
    pub fn push(&mut self, piece: &str) -> String {
        if self.hit.is_some() {
            return String::new();
        }
        self.pending.push_str(piece);

        if let Some((index, stop)) = find_stop(&self.pending, &self.stops) {
            let emitted = self.pending[..index].to_string();
            self.hit = Some(stop.to_string());
            self.pending.clear();
            return emitted;
        }

        let held = self.held_suffix_start();
        let emitted = self.pending[..held].to_string();
        self.pending.drain(..held);
        emitted
    }

    /// Release whatever is still withheld once generation is over
    pub fn finish(&mut self) -> String {
        std::mem::take(&mut self.pending)
    }

    pub fn stop_hit(&self) -> Option<&str> {
        self.hit.as_deref()
    }

    /// Byte offset where the longest suffix that prefixes some stop begins
    fn held_suffix_start(&self) -> usize {
        self.pending
            .char_indices()
            .map(|(i, _)| i)
            .find(|&i| {
                let tail = &self.pending[i..];
                self.stops.iter().any(|s| s.starts_with(tail))
            })
            .unwrap_or(self.pending.len())
    }
}

/// Earliest occurrence of any stop sequence in `text`
fn find_stop<'a>(text: &str, stops: &'a [String]) -> Option<(usize, &'a str)> {
    stops
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()).map(|i| (i, s.as_str())))
        .min_by_key(|(i, _)| *i)
}

/// Cut `text` at the first stop sequence, returning the kept text and the
/// stop that matched.
pub fn truncate_at_stop(text: &str, stops: &[String]) -> (String, Option<String>) {
    match find_stop(text, stops) {
        Some((index, stop)) => (text[..index].to_string(), Some(stop.to_string())),
        None => (text.to_string(), None),
    }
}

/// Accumulated text of the current completion
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StreamingBuffer {
    text: String,
}

impl StreamingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, chunk: &str) {
        self.text.push_str(chunk);
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Adopt the final text only when it differs from what was streamed,
    /// ignoring surrounding whitespace. Returns whether the buffer changed.
    pub fn reconcile(&mut self, final_text: &str) -> bool {
        if self.text.trim() == final_text.trim() {
            return false;
        }
        tracing::debug!(
            "final text differs from stream ({} vs {} bytes), replacing",
            final_text.len(),
            self.text.len()
        );
        self.text = final_text.to_string();
        true
    }
}

/// A running completion: a finite, non-restartable sequence of chunks
/// followed by the final result.
pub struct CompletionHandle {
    id: Uuid,
    rx: mpsc::UnboundedReceiver<StreamToken>,
    outcome: Option<Result<CompletionResult, GenerationError>>,
}

impl CompletionHandle {
    pub(crate) fn new(id: Uuid, rx: mpsc::UnboundedReceiver<StreamToken>) -> Self {
        Self {
            id,
            rx,
            outcome: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next chunk in generation order, or `None` once generation has ended
    pub async fn next_chunk(&mut self) -> Option<String> {
        if self.outcome.is_some() {
            return None;
        }
        match self.rx.recv().await {
            Some(StreamToken::Chunk(text)) => Some(text),
            Some(StreamToken::Done(result)) => {
                self.outcome = Some(Ok(result));
                None
            }
            Some(StreamToken::Error(e)) => {
                self.outcome = Some(Err(e));
                None
            }
            None => {
                self.outcome = Some(Err(GenerationError::new(
                    "generation task ended without a result",
                )));
                None
            }
        }
    }

    /// Drain any remaining chunks and resolve with the final result
    pub async fn finish(mut self) -> Result<CompletionResult, GenerationError> {
        while self.next_chunk().await.is_some() {}
        match self.outcome.take() {
            Some(outcome) => outcome,
            None => Err(GenerationError::new("generation task ended without a result")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::completion::StopReason;

    fn stops(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn scan(pieces: &[&str], stop_list: &[&str]) -> (Vec<String>, Option<String>) {
        let mut scanner = StopScanner::new(&stops(stop_list));
        let mut out = Vec::new();
        for piece in pieces {
            let emitted = scanner.push(piece);
            if !emitted.is_empty() {
                out.push(emitted);
            }
        }
        let tail = scanner.finish();
        if !tail.is_empty() {
            out.push(tail);
        }
        (out, scanner.stop_hit().map(str::to_string))
    }

    #[test]
    fn test_stop_marker_is_excluded() {
        let (out, hit) = scan(&["Hi", " there", "<|im_end|>"], &["<|im_end|>"]);
        assert_eq!(out.concat(), "Hi there");
        assert_eq!(hit.as_deref(), Some("<|im_end|>"));
    }

    #[test]
    fn test_stop_split_across_pieces() {
        let (out, hit) = scan(&["Hi there<|im", "_e", "nd|>ignored"], &["<|im_end|>"]);
        assert_eq!(out, vec!["Hi there"]);
        assert_eq!(hit.as_deref(), Some("<|im_end|>"));
    }

    #[test]
    fn test_false_prefix_is_released() {
        let (out, hit) = scan(&["a <|i", "ma", " b"], &["<|im_end|>"]);
        assert_eq!(out.concat(), "a <|ima b");
        assert!(hit.is_none());
    }

    #[test]
    fn test_earliest_stop_wins() {
        let (out, hit) = scan(&["one\ntwo<|im_end|>"], &["<|im_end|>", "\n"]);
        assert_eq!(out.concat(), "one");
        assert_eq!(hit.as_deref(), Some("\n"));
    }

    #[test]
    fn test_pending_prefix_flushed_at_end() {
        let (out, hit) = scan(&["done <|im"], &["<|im_end|>"]);
        assert_eq!(out, vec!["done ", "<|im"]);
        assert!(hit.is_none());
    }

    #[test]
    fn test_multibyte_text() {
        let (out, _) = scan(&["привет", " мир"], &["<|im_end|>"]);
        assert_eq!(out.concat(), "привет мир");
    }

    #[test]
    fn test_truncate_at_stop() {
        let (text, stop) = truncate_at_stop("Hi there<|im_end|>", &stops(&["<|im_end|>"]));
        assert_eq!(text, "Hi there");
        assert_eq!(stop.as_deref(), Some("<|im_end|>"));

        let (text, stop) = truncate_at_stop("plain", &stops(&["<|im_end|>"]));
        assert_eq!(text, "plain");
        assert!(stop.is_none());
    }

    #[test]
    fn test_buffer_is_concatenation_of_chunks() {
        let mut buffer = StreamingBuffer::new();
        for chunk in ["The", " quick", " fox"] {
            buffer.append(chunk);
        }
        assert_eq!(buffer.text(), "The quick fox");
    }

    #[test]
    fn test_reconcile_keeps_stream_when_equal() {
        let mut buffer = StreamingBuffer::new();
        buffer.append("Hi there ");
        assert!(!buffer.reconcile("Hi there"));
        assert_eq!(buffer.text(), "Hi there ");
    }

    #[test]
    fn test_reconcile_adopts_differing_final() {
        let mut buffer = StreamingBuffer::new();
        buffer.append("Hi th");
        assert!(buffer.reconcile("Hi there"));
        assert_eq!(buffer.text(), "Hi there");
    }

    #[tokio::test]
    async fn test_handle_yields_chunks_then_result() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut handle = CompletionHandle::new(Uuid::new_v4(), rx);
        tx.send(StreamToken::Chunk("a".to_string())).unwrap();
        tx.send(StreamToken::Chunk("b".to_string())).unwrap();
        tx.send(StreamToken::Done(CompletionResult {
            text: "ab".to_string(),
            stop_reason: StopReason::EndOfGeneration,
            tokens_predicted: 2,
            elapsed_ms: 1,
        }))
        .unwrap();

        assert_eq!(handle.next_chunk().await.as_deref(), Some("a"));
        assert_eq!(handle.next_chunk().await.as_deref(), Some("b"));
        assert_eq!(handle.next_chunk().await, None);
        assert_eq!(handle.next_chunk().await, None);
        assert_eq!(handle.finish().await.unwrap().text, "ab");
    }

    #[tokio::test]
    async fn test_handle_reports_dropped_task() {
        let (tx, rx) = mpsc::unbounded_channel::<StreamToken>();
        drop(tx);
        let handle = CompletionHandle::new(Uuid::new_v4(), rx);
        assert!(handle.finish().await.is_err());
    }
}
