//! Process-level chat lifecycle
//!
//! `Uninitialized → Initializing → Ready ⇄ Streaming`, with `Initializing →
//! Failed` on error. Leaving `Failed` requires an explicit restart.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
    Streaming,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    BeginInit,
    InitSucceeded,
    InitFailed(String),
    Submit,
    Finished,
    Release,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot apply {event:?} while {phase:?}")]
pub struct LifecycleError {
    pub phase: Phase,
    pub event: Event,
}

impl Phase {
    /// Apply an event, returning the next phase
    pub fn apply(&self, event: Event) -> Result<Phase, LifecycleError> {
        let next = match (self, &event) {
            // Restart is allowed from any settled phase
            (Phase::Uninitialized | Phase::Ready | Phase::Failed(_), Event::BeginInit) => {
                Some(Phase::Initializing)
            }
            (Phase::Initializing, Event::InitSucceeded) => Some(Phase::Ready),
            (Phase::Initializing, Event::InitFailed(msg)) => Some(Phase::Failed(msg.clone())),
            (Phase::Ready, Event::Submit) => Some(Phase::Streaming),
            (Phase::Streaming, Event::Finished) => Some(Phase::Ready),
            (Phase::Streaming, Event::Release) => None,
            (_, Event::Release) => Some(Phase::Uninitialized),
            _ => None,
        };
        let Some(next) = next else {
            return Err(LifecycleError {
                phase: self.clone(),
                event,
            });
        };
        tracing::debug!("lifecycle: {:?} --{:?}--> {:?}", self, event, next);
        Ok(next)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Phase::Ready)
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Phase::Initializing | Phase::Streaming)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let phase = Phase::default();
        let phase = phase.apply(Event::BeginInit).unwrap();
        assert_eq!(phase, Phase::Initializing);
        let phase = phase.apply(Event::InitSucceeded).unwrap();
        assert!(phase.is_ready());
        let phase = phase.apply(Event::Submit).unwrap();
        assert_eq!(phase, Phase::Streaming);
        let phase = phase.apply(Event::Finished).unwrap();
        assert!(phase.is_ready());
    }

    #[test]
    fn test_no_concurrent_streaming() {
        let err = Phase::Streaming.apply(Event::Submit).unwrap_err();
        assert_eq!(err.phase, Phase::Streaming);
    }

    #[test]
    fn test_failure_requires_restart() {
        let failed = Phase::Initializing
            .apply(Event::InitFailed("bad path".to_string()))
            .unwrap();
        assert_eq!(failed, Phase::Failed("bad path".to_string()));
        assert!(failed.apply(Event::Submit).is_err());
        assert_eq!(failed.apply(Event::BeginInit).unwrap(), Phase::Initializing);
    }

    #[test]
    fn test_submit_requires_session() {
        assert!(Phase::Uninitialized.apply(Event::Submit).is_err());
        assert!(Phase::Initializing.apply(Event::Submit).is_err());
    }

    #[test]
    fn test_release() {
        assert_eq!(Phase::Ready.apply(Event::Release).unwrap(), Phase::Uninitialized);
        assert!(Phase::Streaming.apply(Event::Release).is_err());
    }
}
