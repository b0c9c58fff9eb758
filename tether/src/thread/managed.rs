use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use core_affinity::CoreId;

use crate::sync::DEFAULT_SIGNAL_TIMEOUT;
use crate::trace::{debug, error, info, warn};

use super::ThreadError;
use super::current;
use super::task::{Shared, Task, TaskContext};

/// Lifecycle state of a [`ManagedThread`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Constructed, `start` not yet called.
    NotStarted,
    /// The task has been spawned.
    Running,
    /// `destroy` is latched; the task has not been joined yet.
    StopRequested,
    /// The OS thread has been joined, or the thread was stopped before it
    /// ever ran. Terminal.
    Stopped,
}

/// Configuration for a [`ManagedThread`].
#[derive(Debug, Clone)]
pub struct ThreadConfig {
    /// Thread name, also given to the OS thread at spawn.
    pub name: String,
    /// Stack size for the OS thread. `None` uses the platform default.
    pub stack_size: Option<usize>,
    /// Core to pin the thread to. `None` leaves placement to the OS.
    pub cpu: Option<usize>,
    /// Upper bound on a single [`TaskContext::wait_for_any_signal`].
    pub signal_timeout: Duration,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            name: "tether-worker".into(),
            stack_size: None,
            cpu: None,
            signal_timeout: DEFAULT_SIGNAL_TIMEOUT,
        }
    }
}

impl ThreadConfig {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Guarded by the thread's main mutex.
struct Inner<T> {
    state: ThreadState,
    /// Present until `start` moves it onto the spawned thread.
    task: Option<T>,
    handle: Option<JoinHandle<()>>,
    /// Id of the spawned OS thread, kept after the handle is taken.
    thread_id: Option<ThreadId>,
}

impl<T> Inner<T> {
    /// Someone has taken the handle and is joining it right now.
    fn join_in_progress(&self) -> bool {
        self.handle.is_none()
            && matches!(self.state, ThreadState::Running | ThreadState::StopRequested)
    }

    fn is_self(&self) -> bool {
        self.thread_id == Some(thread::current().id())
    }
}

/// An OS thread running a [`Task`] under a cooperative start/stop protocol.
///
/// All methods take `&self`, so the thread object can be shared (e.g. behind
/// an `Arc`) with whoever needs to [`notify`](Self::notify) it.
///
/// Dropping a thread that is still running latches `destroy`, wakes the task
/// and detaches the OS thread without waiting for it.
pub struct ManagedThread<T: Task> {
    shared: Arc<Shared>,
    stack_size: Option<usize>,
    cpu: Option<usize>,
    inner: Mutex<Inner<T>>,
    /// Signalled once the OS thread has been joined.
    exited: Condvar,
}

impl<T: Task> ManagedThread<T> {
    /// Creates a thread in the [`ThreadState::NotStarted`] state.
    #[must_use]
    pub fn new(name: impl Into<String>, task: T) -> Self {
        Self::with_config(ThreadConfig::named(name), task)
    }

    #[must_use]
    pub fn with_config(config: ThreadConfig, task: T) -> Self {
        Self {
            shared: Arc::new(Shared::new(config.name, config.signal_timeout)),
            stack_size: config.stack_size,
            cpu: config.cpu,
            inner: Mutex::new(Inner {
                state: ThreadState::NotStarted,
                task: Some(task),
                handle: None,
                thread_id: None,
            }),
            exited: Condvar::new(),
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner<T>> {
        // Nothing panics while holding the lock; recover rather than cascade.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns the OS thread and runs the task on it.
    ///
    /// Clears `destroy` and sets `alive` before the spawn. The task runs
    /// concurrently with the caller; nothing is guaranteed about its progress
    /// when this returns.
    ///
    /// # Errors
    ///
    /// - [`ThreadError::AlreadyRunning`] if started before and not yet stopped.
    /// - [`ThreadError::AlreadyStopped`] if the thread has stopped. Restart
    ///   requires a fresh instance.
    /// - [`ThreadError::Spawn`] if the OS refuses the thread. The task is
    ///   dropped and the thread becomes [`ThreadState::Stopped`].
    pub fn start(&self) -> Result<(), ThreadError> {
        let mut inner = self.lock_inner();
        let name = self.shared.name();

        match inner.state {
            ThreadState::NotStarted => {}
            ThreadState::Running | ThreadState::StopRequested => {
                warn!(thread = %name, "start on a running thread");
                return Err(ThreadError::AlreadyRunning);
            }
            ThreadState::Stopped => {
                warn!(thread = %name, "start on a stopped thread");
                return Err(ThreadError::AlreadyStopped);
            }
        }

        let Some(mut task) = inner.task.take() else {
            inner.state = ThreadState::Stopped;
            return Err(ThreadError::AlreadyStopped);
        };

        self.shared.reset_destroy();
        self.shared.set_alive(true);

        // OS thread names cannot carry interior NULs.
        let mut builder = thread::Builder::new().name(name.replace('\0', ""));
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }

        let shared = Arc::clone(&self.shared);
        let cpu = self.cpu;
        let spawned = builder.spawn(move || {
            let _exit = ExitGuard {
                shared: Arc::clone(&shared),
            };
            let _current = current::enter(Arc::clone(&shared));

            if let Some(id) = cpu
                && !core_affinity::set_for_current(CoreId { id })
            {
                warn!(cpu = id, "failed to pin managed thread");
            }

            debug!("task started");
            let ctx = TaskContext { shared };
            task.run(&ctx);
            debug!("task returned");
        });

        match spawned {
            Ok(handle) => {
                inner.thread_id = Some(handle.thread().id());
                inner.handle = Some(handle);
                inner.state = ThreadState::Running;
                info!(thread = %name, cpu = ?self.cpu, "managed thread started");
                Ok(())
            }
            Err(e) => {
                self.shared.set_alive(false);
                inner.state = ThreadState::Stopped;
                error!(thread = %name, error = %e, "failed to spawn managed thread");
                Err(ThreadError::Spawn(e))
            }
        }
    }

    /// Requests termination and optionally waits for it.
    ///
    /// With `send_destroy`, latches `destroy` and notifies the task so a task
    /// parked in [`TaskContext::wait_for_any_signal`] wakes promptly. With
    /// `wait`, blocks until the OS thread has exited; otherwise returns
    /// immediately and the thread exits on its own.
    ///
    /// Safe to call any number of times in any state, from any thread. While
    /// one caller is joining, other waiting callers block until the join is
    /// done. Stopping a thread that was never started makes it
    /// [`ThreadState::Stopped`].
    ///
    /// Called from the managed thread itself, `wait` is ignored: the task
    /// cannot wait for its own exit. The handle stays in place for a later
    /// external join.
    ///
    /// `stop(true, false)` blocks until the task returns by itself.
    pub fn stop(&self, wait: bool, send_destroy: bool) {
        let handle = {
            let mut inner = self.lock_inner();

            if send_destroy {
                self.shared.request_destroy();
                match inner.state {
                    ThreadState::NotStarted => {
                        inner.state = ThreadState::Stopped;
                        inner.task = None;
                    }
                    ThreadState::Running => inner.state = ThreadState::StopRequested,
                    ThreadState::StopRequested | ThreadState::Stopped => {}
                }
            }

            debug!(
                thread = %self.shared.name(),
                state = ?inner.state,
                wait,
                send_destroy,
                "stop requested"
            );

            if !wait {
                return;
            }
            if inner.is_self() {
                warn!(thread = %self.shared.name(), "managed thread cannot wait for itself");
                return;
            }
            match inner.handle.take() {
                Some(handle) => handle,
                None => {
                    drop(self.wait_for_join(inner));
                    return;
                }
            }
        };

        self.finish(handle);
    }

    /// Equivalent to `stop(true, true)`.
    pub fn stop_default(&self) {
        self.stop(true, true);
    }

    /// Blocks until the OS thread exits.
    ///
    /// Returns `false` if this caller had no handle to join: never started,
    /// already joined, joined concurrently by another caller (after waiting
    /// for that join to finish), or called from the managed thread itself.
    pub fn join(&self) -> bool {
        let mut inner = self.lock_inner();
        if inner.is_self() {
            warn!(thread = %self.shared.name(), "managed thread cannot join itself");
            return false;
        }

        match inner.handle.take() {
            Some(handle) => {
                drop(inner);
                self.finish(handle);
                true
            }
            None => {
                drop(self.wait_for_join(inner));
                false
            }
        }
    }

    fn wait_for_join<'a>(&self, inner: MutexGuard<'a, Inner<T>>) -> MutexGuard<'a, Inner<T>> {
        self.exited
            .wait_while(inner, |inner| inner.join_in_progress())
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self, handle: JoinHandle<()>) {
        debug!(thread = %self.shared.name(), "joining managed thread");

        if handle.join().is_err() {
            error!(thread = %self.shared.name(), "managed thread task panicked");
        }

        self.shared.set_alive(false);
        self.lock_inner().state = ThreadState::Stopped;
        self.exited.notify_all();
        info!(thread = %self.shared.name(), "managed thread stopped");
    }

    /// Snapshot of liveness. May be stale by the time the caller acts on it.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.shared.is_alive()
    }

    /// Returns `true` once termination has been requested.
    #[must_use]
    pub fn test_destroy(&self) -> bool {
        self.shared.test_destroy()
    }

    /// Wakes the task if it is parked in [`TaskContext::wait_for_any_signal`].
    pub fn notify(&self) {
        self.shared.notify();
    }

    #[must_use]
    pub fn state(&self) -> ThreadState {
        self.lock_inner().state
    }

    #[must_use]
    pub fn thread_name(&self) -> String {
        self.shared.name()
    }

    /// Renames the thread for [`thread_name`](Self::thread_name),
    /// [`TaskContext::name`] and [`current_name`](super::current_name).
    ///
    /// The OS-level name is fixed at spawn.
    pub fn set_thread_name(&self, name: impl Into<String>) {
        self.shared.set_name(name.into());
    }
}

impl<T: Task> Drop for ManagedThread<T> {
    fn drop(&mut self) {
        let inner = self
            .inner
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(handle) = inner.handle.take() {
            if !handle.is_finished() {
                warn!(
                    thread = %self.shared.name(),
                    "managed thread dropped while running, detaching"
                );
            }
            self.shared.request_destroy();
        }
    }
}

/// Clears `alive` when the task returns or unwinds.
struct ExitGuard {
    shared: Arc<Shared>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.shared.set_alive(false);
    }
}
