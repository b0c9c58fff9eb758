use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::sync::Signal;

/// User-supplied body of a managed thread.
///
/// `run` is called exactly once, on the spawned thread. It is expected to loop
/// until [`TaskContext::test_destroy`] returns `true` and then return promptly.
/// Panics are not caught: they end the thread and are reported by
/// [`ManagedThread::join`](super::ManagedThread::join).
///
/// Any `FnMut(&TaskContext) + Send + 'static` closure is a task, including a
/// boxed one when the concrete type has to be erased.
pub trait Task: Send + 'static {
    fn run(&mut self, ctx: &TaskContext);
}

impl<F> Task for F
where
    F: FnMut(&TaskContext) + Send + 'static,
{
    fn run(&mut self, ctx: &TaskContext) {
        self(ctx);
    }
}

/// State shared between a [`ManagedThread`](super::ManagedThread) and its task.
#[derive(Debug)]
pub(super) struct Shared {
    name: Mutex<String>,
    alive: AtomicBool,
    destroy: AtomicBool,
    signal: Signal,
    signal_timeout: Duration,
}

impl Shared {
    pub(super) fn new(name: String, signal_timeout: Duration) -> Self {
        Self {
            name: Mutex::new(name),
            alive: AtomicBool::new(false),
            destroy: AtomicBool::new(false),
            signal: Signal::new(),
            signal_timeout,
        }
    }

    pub(super) fn name(&self) -> String {
        self.name
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(super) fn set_name(&self, name: String) {
        *self.name.lock().unwrap_or_else(PoisonError::into_inner) = name;
    }

    pub(super) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub(super) fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Release);
    }

    pub(super) fn test_destroy(&self) -> bool {
        self.destroy.load(Ordering::Acquire)
    }

    /// Clears the latch before a spawn. Only valid while no task is running.
    pub(super) fn reset_destroy(&self) {
        self.destroy.store(false, Ordering::Release);
    }

    /// Latches `destroy` and wakes the task if it is parked.
    pub(super) fn request_destroy(&self) {
        self.destroy.store(true, Ordering::Release);
        self.signal.notify();
    }

    pub(super) fn notify(&self) {
        self.signal.notify();
    }

    pub(super) fn wait_for_any_signal(&self) {
        self.signal.wait_timeout(self.signal_timeout);
    }
}

/// The running task's view of its managed thread.
pub struct TaskContext {
    pub(super) shared: std::sync::Arc<Shared>,
}

impl TaskContext {
    /// Returns `true` once a stop with `send_destroy` has been requested.
    ///
    /// The latch never resets while the task runs.
    #[inline]
    #[must_use]
    pub fn test_destroy(&self) -> bool {
        self.shared.test_destroy()
    }

    /// Parks for at most the configured signal timeout, or until the owning
    /// [`ManagedThread`](super::ManagedThread) is notified or asked to stop.
    pub fn wait_for_any_signal(&self) {
        self.shared.wait_for_any_signal();
    }

    /// Current name of the managed thread.
    #[must_use]
    pub fn name(&self) -> String {
        self.shared.name()
    }
}
