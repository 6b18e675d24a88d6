//! First-class deadlines for workflow pipelines.

use std::time::{Duration, Instant};

/// A point in time by which an operation must complete.
///
/// `Deadline` is cheap to copy and carried as a plain value across
/// suspension points, per the "values passed across suspension points must
/// be owned" rule in the concurrency model.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// No deadline: the operation may run indefinitely.
    pub fn never() -> Self {
        Self { at: None }
    }

    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Some(Instant::now() + timeout),
        }
    }

    /// Whether `Instant::now()` is at or past the deadline.
    pub fn is_expired(&self) -> bool {
        matches!(self.at, Some(at) if Instant::now() >= at)
    }

    /// Remaining time, or `None` if there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::never()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_does_not_expire() {
        let d = Deadline::never();
        assert!(!d.is_expired());
        assert_eq!(d.remaining(), None);
    }

    #[test]
    fn after_expires_once_elapsed() {
        let d = Deadline::after(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(20));
        assert!(d.is_expired());
    }
}
