//! One-shot broadcast cancellation.
//!
//! The signal is a zero-capacity channel that never carries a value.
//! Firing the trigger drops its only sender, which disconnects the
//! channel and wakes every `select` that waits on a [`CancelSignal`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::debug;

struct Shared {
    fired: AtomicBool,
    // Taken and dropped exactly once, when the trigger fires.
    sender: Mutex<Option<Sender<()>>>,
    receiver: Receiver<()>,
}

/// Observer half. Cheap to clone, one clone per producer.
#[derive(Clone)]
pub struct CancelSignal {
    shared: Arc<Shared>,
}

/// Firing half. Clones fire the same signal.
#[derive(Clone)]
pub struct CancelTrigger {
    shared: Arc<Shared>,
}

impl CancelSignal {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (CancelSignal, CancelTrigger) {
        let (tx, rx) = bounded(0);
        let shared = Arc::new(Shared {
            fired: AtomicBool::new(false),
            sender: Mutex::new(Some(tx)),
            receiver: rx,
        });
        let trigger = CancelTrigger {
            shared: Arc::clone(&shared),
        };
        (CancelSignal { shared }, trigger)
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.fired.load(Ordering::Acquire)
    }

    /// Blocks until the trigger fires.
    pub fn wait(&self) {
        // Nothing is ever sent, so this only returns on disconnect.
        let _ = self.shared.receiver.recv();
    }

    /// Returns `true` if the trigger fired within `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        !matches!(
            self.shared.receiver.recv_timeout(timeout),
            Err(RecvTimeoutError::Timeout)
        )
    }

    /// Becomes ready once the trigger fires, for use in `select!` arms.
    pub(crate) fn receiver(&self) -> &Receiver<()> {
        &self.shared.receiver
    }
}

impl fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSignal")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancelTrigger {
    /// Fires the signal. Only the first call has any effect.
    pub fn trigger(&self) {
        if self.shared.fired.swap(true, Ordering::AcqRel) {
            return;
        }
        let sender = self
            .shared
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);
        debug!("cancellation triggered");
    }

    pub fn is_triggered(&self) -> bool {
        self.shared.fired.load(Ordering::Acquire)
    }

    /// Another observer of this trigger.
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl fmt::Debug for CancelTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelTrigger")
            .field("triggered", &self.is_triggered())
            .finish()
    }
}
