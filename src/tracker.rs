//! Counting completion latch, the `WaitGroup` of this crate.

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::{Error, Result};

/// Counts outstanding parties down to zero.
///
/// Each registered party calls [`done`](Self::done) exactly once; waiters
/// are released together when the last one does. The count never goes
/// below zero, so completion is observed exactly once.
pub struct CompletionTracker {
    registered: usize,
    pending: Mutex<usize>,
    condvar: Condvar,
}

impl CompletionTracker {
    pub fn new(parties: usize) -> Self {
        Self {
            registered: parties,
            pending: Mutex::new(parties),
            condvar: Condvar::new(),
        }
    }

    // The counter is a plain integer, so a poisoned lock still holds a
    // consistent value.
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reports one party finished.
    ///
    /// Fails with [`Error::TrackerOverflow`] if every registered party
    /// already reported.
    pub fn try_done(&self) -> Result<()> {
        let mut pending = self.lock();
        if *pending == 0 {
            return Err(Error::TrackerOverflow {
                registered: self.registered,
            });
        }
        *pending -= 1;
        if *pending == 0 {
            trace!(parties = self.registered, "completion reached");
            self.condvar.notify_all();
        }
        Ok(())
    }

    /// Reports one party finished.
    ///
    /// # Panics
    ///
    /// Panics when called more often than the number of registered parties.
    pub fn done(&self) {
        if let Err(err) = self.try_done() {
            panic!("{}", err);
        }
    }

    /// Blocks until every party has reported.
    pub fn wait(&self) {
        let mut pending = self.lock();
        while *pending > 0 {
            pending = self
                .condvar
                .wait(pending)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Returns `true` if completion was reached within `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            // Too far out to represent; no different from waiting forever.
            self.wait();
            return true;
        };
        let mut pending = self.lock();
        while *pending > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            pending = self
                .condvar
                .wait_timeout(pending, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    pub fn pending(&self) -> usize {
        *self.lock()
    }

    pub fn is_complete(&self) -> bool {
        self.pending() == 0
    }

    /// Guard that reports `done` when dropped, including during a panic.
    pub fn guard(&self) -> CompletionGuard<'_> {
        CompletionGuard { tracker: self }
    }
}

impl fmt::Debug for CompletionTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionTracker")
            .field("registered", &self.registered)
            .field("pending", &self.pending())
            .finish()
    }
}

#[must_use = "dropping the guard immediately reports completion"]
pub struct CompletionGuard<'a> {
    tracker: &'a CompletionTracker,
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        // Never panic while possibly unwinding already.
        if let Err(err) = self.tracker.try_done() {
            tracing::error!("{}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_zero_parties_is_complete() {
        let tracker = CompletionTracker::new(0);
        assert!(tracker.is_complete());
        tracker.wait();
        assert!(tracker.wait_timeout(Duration::ZERO));
    }

    #[test]
    fn test_wait_blocks_until_last_done() {
        let tracker = CompletionTracker::new(2);
        tracker.done();
        assert_eq!(tracker.pending(), 1);
        assert!(!tracker.wait_timeout(Duration::from_millis(20)));
        tracker.done();
        assert!(tracker.wait_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn test_concurrent_done() {
        let tracker = Arc::new(CompletionTracker::new(16));
        let finished = Arc::new(AtomicUsize::new(0));

        for _ in 0..16 {
            let tracker = Arc::clone(&tracker);
            let finished = Arc::clone(&finished);
            thread::spawn(move || {
                finished.fetch_add(1, Ordering::SeqCst);
                tracker.done();
            });
        }

        tracker.wait();
        assert_eq!(finished.load(Ordering::SeqCst), 16);
        assert!(tracker.is_complete());
    }

    #[test]
    fn test_over_release_is_rejected() {
        let tracker = CompletionTracker::new(1);
        tracker.try_done().unwrap();
        assert!(matches!(
            tracker.try_done(),
            Err(Error::TrackerOverflow { registered: 1 })
        ));
        assert_eq!(tracker.pending(), 0);
    }

    #[test]
    #[should_panic(expected = "released more times")]
    fn test_done_past_zero_panics() {
        let tracker = CompletionTracker::new(1);
        tracker.done();
        tracker.done();
    }

    #[test]
    fn test_wait_timeout_accepts_unbounded_duration() {
        let tracker = Arc::new(CompletionTracker::new(1));
        let worker = {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                tracker.done();
            })
        };

        assert!(tracker.wait_timeout(Duration::MAX));
        worker.join().unwrap();
    }

    #[test]
    fn test_guard_over_release_does_not_panic() {
        let tracker = CompletionTracker::new(1);
        tracker.done();
        drop(tracker.guard());
        assert_eq!(tracker.pending(), 0);
        assert!(tracker.is_complete());
    }

    #[test]
    fn test_guard_counts_down_on_panic() {
        let tracker = Arc::new(CompletionTracker::new(1));
        let worker = {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                let _guard = tracker.guard();
                panic!("worker failed");
            })
        };

        assert!(worker.join().is_err());
        assert!(tracker.wait_timeout(Duration::from_secs(1)));
    }
}
