//! Progress-callback trait for expansion rounds.
//!
//! Inject an [`Arc<dyn ExpansionProgressCallback>`] via
//! [`crate::config::ExpansionConfigBuilder::progress_callback`] to receive
//! events as the expansion loop runs. The CLI drives its spinner from these;
//! a web host can forward them to a socket.
//!
//! # Example
//!
//! ```rust
//! use edgequake_report::{ExpansionConfig, ExpansionProgressCallback};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ExpansionProgressCallback for Printer {
//!     fn on_round_complete(&self, round: u32, chars: usize, pages: u32) {
//!         eprintln!("round {round}: {chars} chars, ~{pages} pages");
//!     }
//! }
//!
//! let config = ExpansionConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::StopReason;
use std::sync::Arc;

/// Called by the expansion loop as it runs.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Rounds are strictly sequential within one
/// expansion, but several expansions may share a callback.
pub trait ExpansionProgressCallback: Send + Sync {
    /// Called once before round 0.
    ///
    /// # Arguments
    /// * `target_pages` — requested length
    /// * `max_rounds`   — round budget
    fn on_expansion_start(&self, target_pages: u32, max_rounds: u32) {
        let _ = (target_pages, max_rounds);
    }

    /// Called just before the generation request for a round is sent.
    fn on_round_start(&self, round: u32, max_rounds: u32) {
        let _ = (round, max_rounds);
    }

    /// Called after a round's text was accepted and measured.
    ///
    /// # Arguments
    /// * `round` — 0-indexed round number
    /// * `chars` — accumulated length in characters
    /// * `pages` — estimated page count after this round
    fn on_round_complete(&self, round: u32, chars: usize, pages: u32) {
        let _ = (round, chars, pages);
    }

    /// Called once when the loop terminates, for any reason.
    fn on_expansion_complete(&self, rounds: u32, pages: u32, stop: StopReason) {
        let _ = (rounds, pages, stop);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExpansionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExpansionConfig`].
pub type ProgressCallback = Arc<dyn ExpansionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicU32,
        completes: AtomicU32,
        last_chars: AtomicUsize,
        stop: Mutex<Option<StopReason>>,
    }

    impl ExpansionProgressCallback for TrackingCallback {
        fn on_round_start(&self, _round: u32, _max_rounds: u32) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_round_complete(&self, _round: u32, chars: usize, _pages: u32) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.last_chars.store(chars, Ordering::SeqCst);
        }

        fn on_expansion_complete(&self, _rounds: u32, _pages: u32, stop: StopReason) {
            *self.stop.lock().unwrap() = Some(stop);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_expansion_start(5, 8);
        cb.on_round_start(0, 8);
        cb.on_round_complete(0, 1200, 2);
        cb.on_expansion_complete(1, 2, StopReason::EmptyResponse);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_round_start(0, 8);
        tracker.on_round_complete(0, 900, 1);
        tracker.on_round_start(1, 8);
        tracker.on_round_complete(1, 2100, 3);
        tracker.on_expansion_complete(2, 3, StopReason::TargetReached);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.last_chars.load(Ordering::SeqCst), 2100);
        assert_eq!(*tracker.stop.lock().unwrap(), Some(StopReason::TargetReached));
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_round_start(0, 1);
    }
}
