//! The 12-hour checksum-mismatch auto-accept exception:
//! once the user accepts a specific `(expected, got)` mismatch, the same
//! mismatch is auto-accepted without re-prompting until the exception
//! expires.
//!
//! `Reporter` has no dedicated "accept this checksum mismatch" prompt; this cache lets `PackageProvider` reuse
//! that same prompt for checksum mismatches — recorded as an Open Question
//! resolution in `DESIGN.md` — while still honoring the 12-hour exception
//! window scenario 5 requires.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_WINDOW: Duration = Duration::from_secs(12 * 3600);

/// Remembers accepted `(expected, got)` checksum mismatches for a bounded
/// window, so the same recurring mismatch isn't re-prompted every time.
#[derive(Debug)]
pub struct ChecksumExceptionCache {
    window: Duration,
    accepted: Mutex<HashMap<(String, String), Instant>>,
}

impl Default for ChecksumExceptionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ChecksumExceptionCache {
    /// A cache using the default 12-hour exception window.
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    /// A cache using a custom exception window, for tests.
    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            accepted: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `(expected, got)` was already accepted within the window and
    /// can be auto-accepted again without asking.
    pub fn is_exempt(&self, expected: &str, got: &str) -> bool {
        let accepted = self.accepted.lock().unwrap();
        matches!(
            accepted.get(&(expected.to_string(), got.to_string())),
            Some(at) if at.elapsed() < self.window
        )
    }

    /// Record that `(expected, got)` was just accepted, starting a fresh
    /// exception window.
    pub fn remember(&self, expected: &str, got: &str) {
        self.accepted
            .lock()
            .unwrap()
            .insert((expected.to_string(), got.to_string()), Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_pair_is_exempt_within_window() {
        let cache = ChecksumExceptionCache::with_window(Duration::from_secs(3600));
        assert!(!cache.is_exempt("bbbb", "aaaa"));
        cache.remember("bbbb", "aaaa");
        assert!(cache.is_exempt("bbbb", "aaaa"));
    }

    #[test]
    fn different_pair_is_not_exempt() {
        let cache = ChecksumExceptionCache::with_window(Duration::from_secs(3600));
        cache.remember("bbbb", "aaaa");
        assert!(!cache.is_exempt("cccc", "aaaa"));
    }

    #[test]
    fn exemption_expires_after_window() {
        let cache = ChecksumExceptionCache::with_window(Duration::from_millis(1));
        cache.remember("bbbb", "aaaa");
        std::thread::sleep(Duration::from_millis(20));
        assert!(!cache.is_exempt("bbbb", "aaaa"));
    }
}
