//! Streaming completion controller
//!
//! At most one completion runs at a time. A second submission while one is
//! in flight is rejected with [`ChatError::Busy`]; there is no queue.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::error::{ChatError, GenerationError, Result};
use crate::inference::prompt::format_prompt;
use crate::inference::session::Session;
use crate::inference::streaming::{truncate_at_stop, CompletionHandle, StopScanner, StreamToken};
use crate::types::completion::{CompletionRequest, CompletionResult, EngineStop, StopReason};
use crate::types::config::SamplingParams;

/// Build a request from raw user input. Blank input never becomes a request.
pub fn build_request(
    user_input: &str,
    system_prompt: &str,
    sampling: &SamplingParams,
) -> Result<CompletionRequest> {
    if user_input.trim().is_empty() {
        return Err(ChatError::EmptyPrompt);
    }
    Ok(CompletionRequest::new(
        format_prompt(system_prompt, user_input),
        sampling.clone(),
    ))
}

/// Releases the in-flight slot when dropped
struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag: flag.clone() })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Default)]
pub struct StreamingController {
    in_flight: Arc<AtomicBool>,
}

impl StreamingController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Start a completion on the blocking pool. Must be called from within a
    /// tokio runtime.
    pub fn submit(&self, session: Arc<Session>, request: CompletionRequest) -> Result<CompletionHandle> {
        let guard = InFlightGuard::acquire(&self.in_flight).ok_or(ChatError::Busy)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let id = request.id;
        tracing::info!("request {} submitted ({} prompt bytes)", id, request.prompt.len());

        tokio::task::spawn_blocking(move || {
            let outcome = drive(&session, &request, &tx);
            // Free the slot before the final message so the receiver can
            // submit again as soon as it sees the result.
            drop(guard);
            let message = match outcome {
                Ok(result) => {
                    tracing::info!(
                        "request {} done: {:?}, {} tokens in {} ms",
                        request.id,
                        result.stop_reason,
                        result.tokens_predicted,
                        result.elapsed_ms
                    );
                    StreamToken::Done(result)
                }
                Err(e) => {
                    tracing::error!("request {} failed: {}", request.id, e);
                    StreamToken::Error(e)
                }
            };
            let _ = tx.send(message);
        });

        Ok(CompletionHandle::new(id, rx))
    }

    /// Submit and drain a completion, calling `on_partial` with each chunk
    pub async fn run<F>(
        &self,
        session: Arc<Session>,
        request: CompletionRequest,
        mut on_partial: F,
    ) -> Result<CompletionResult>
    where
        F: FnMut(&str),
    {
        let mut handle = self.submit(session, request)?;
        while let Some(chunk) = handle.next_chunk().await {
            on_partial(&chunk);
        }
        Ok(handle.finish().await?)
    }
}

fn drive(
    session: &Session,
    request: &CompletionRequest,
    tx: &mpsc::UnboundedSender<StreamToken>,
) -> std::result::Result<CompletionResult, GenerationError> {
    let started = Instant::now();
    let mut scanner = StopScanner::new(&request.sampling.stop);

    let completed = {
        let mut sink = |piece: &str| {
            let emitted = scanner.push(piece);
            if !emitted.is_empty() && tx.send(StreamToken::Chunk(emitted)).is_err() {
                // Nobody is listening any more
                return ControlFlow::Break(());
            }
            if scanner.stop_hit().is_some() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };
        session.engine().complete(request, &mut sink)
    };

    // Held-back text is released on every exit, including engine errors
    let tail = scanner.finish();
    if !tail.is_empty() {
        let _ = tx.send(StreamToken::Chunk(tail));
    }
    let output = completed?;

    let (text, stop_word) = truncate_at_stop(&output.text, &request.sampling.stop);
    let stop_reason = match stop_word.or_else(|| scanner.stop_hit().map(str::to_string)) {
        Some(stop) => StopReason::StopSequence(stop),
        None if output.stop == EngineStop::TokenLimit => StopReason::MaxTokens,
        None => StopReason::EndOfGeneration,
    };

    Ok(CompletionResult {
        text,
        stop_reason,
        tokens_predicted: output.tokens_predicted,
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}
