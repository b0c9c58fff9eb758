//! Bounded-wait wake-up signal.
//!
//! A [`Signal`] is a notification, not a message: nothing is queued. A
//! [`Signal::notify`] with no thread parked in a wait is lost, and a wait may
//! return because its timeout elapsed, because it was notified, or spuriously.
//! Callers always re-check their own condition after waking.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use tether::sync::Signal;
//!
//! let signal = Arc::new(Signal::new());
//! let ready = Arc::new(AtomicBool::new(false));
//!
//! let waiter = {
//!     let signal = Arc::clone(&signal);
//!     let ready = Arc::clone(&ready);
//!     std::thread::spawn(move || {
//!         while !ready.load(Ordering::Acquire) {
//!             signal.wait_for_any_signal();
//!         }
//!     })
//! };
//!
//! ready.store(true, Ordering::Release);
//! signal.notify();
//! waiter.join().unwrap();
//! ```

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Upper bound on a single [`Signal::wait_for_any_signal`] call.
pub const DEFAULT_SIGNAL_TIMEOUT: Duration = Duration::from_millis(1);

/// Condition-variable backed, single-slot wake-up signal.
#[derive(Debug, Default)]
pub struct Signal {
    lock: Mutex<()>,
    cv: Condvar,
}

impl Signal {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            cv: Condvar::new(),
        }
    }

    /// Blocks for at most [`DEFAULT_SIGNAL_TIMEOUT`] or until notified.
    ///
    /// Does not report which of the two happened.
    pub fn wait_for_any_signal(&self) {
        self.wait_timeout(DEFAULT_SIGNAL_TIMEOUT);
    }

    /// Blocks for at most `timeout` or until notified.
    pub fn wait_timeout(&self, timeout: Duration) {
        // The mutex guards no data, so a poisoned lock is still usable.
        let guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = self
            .cv
            .wait_timeout(guard, timeout)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Wakes at most one thread currently parked in a wait.
    ///
    /// Has no effect, and is not remembered, when nobody is waiting.
    pub fn notify(&self) {
        self.cv.notify_one();
    }
}
