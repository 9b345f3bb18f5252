//! Progress reporting
//!
//! Percentages reported while the model is located and loaded.

use std::sync::Arc;

/// Receives whole percentages in `[0, 100]`
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// A callback that ignores every report
pub fn no_progress() -> ProgressCallback {
    Arc::new(|_| {})
}

/// Forwards progress to a callback, dropping values that would make the
/// observed sequence leave `[0, 100]` or go backwards.
pub struct ProgressTracker {
    last: Option<u8>,
    callback: ProgressCallback,
}

impl ProgressTracker {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            last: None,
            callback,
        }
    }

    /// Report a raw percentage. Returns the forwarded value, if any.
    pub fn report(&mut self, percent: f64) -> Option<u8> {
        if percent.is_nan() {
            return None;
        }
        let value = percent.clamp(0.0, 100.0).floor() as u8;
        if matches!(self.last, Some(last) if value <= last) {
            return None;
        }
        self.last = Some(value);
        (self.callback)(value);
        Some(value)
    }

    /// Report progress as a byte count against a known total
    pub fn report_bytes(&mut self, done: u64, total: u64) -> Option<u8> {
        if total == 0 {
            return None;
        }
        self.report(done as f64 * 100.0 / total as f64)
    }

    pub fn last(&self) -> Option<u8> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording() -> (ProgressTracker, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let tracker = ProgressTracker::new(Arc::new(move |p: u8| sink.lock().unwrap().push(p)));
        (tracker, seen)
    }

    #[test]
    fn test_values_are_bounded_and_monotonic() {
        let (mut tracker, seen) = recording();
        for raw in [-5.0, 10.0, 7.5, f64::NAN, 10.4, 55.0, 250.0, 99.0, 100.0] {
            tracker.report(raw);
        }
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen, vec![0, 10, 55, 100]);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert!(seen.iter().all(|p| *p <= 100));
    }

    #[test]
    fn test_report_bytes() {
        let (mut tracker, seen) = recording();
        assert_eq!(tracker.report_bytes(0, 0), None);
        assert_eq!(tracker.report_bytes(512, 1024), Some(50));
        assert_eq!(tracker.report_bytes(1024, 1024), Some(100));
        assert_eq!(tracker.last(), Some(100));
        assert_eq!(*seen.lock().unwrap(), vec![50, 100]);
    }
}
