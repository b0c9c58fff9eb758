//! Managed worker threads with a cooperative lifecycle.
//!
//! A [`ManagedThread`] owns one OS thread, a `destroy` latch, an `alive` flag
//! and a [`Signal`](crate::sync::Signal) used to wake its task early.
//!
//! ```text
//! NotStarted ──start()──> Running ──stop(_, true)──> StopRequested
//!     │                      │                             │
//!     │                      └──────join()/stop(true, _)───┤
//!     └──stop(_, true)──────────────────────────────────> Stopped
//! ```
//!
//! Cancellation is cooperative only. The task polls
//! [`TaskContext::test_destroy`] and returns once it reads `true`; a task that
//! never polls cannot be stopped, and `stop(true, _)` will then block forever.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use tether::thread::{ManagedThread, TaskContext};
//!
//! let ticks = Arc::new(AtomicU64::new(0));
//! let counter = Arc::clone(&ticks);
//!
//! let worker = ManagedThread::new("ticker", move |ctx: &TaskContext| {
//!     while !ctx.test_destroy() {
//!         counter.fetch_add(1, Ordering::Relaxed);
//!         ctx.wait_for_any_signal();
//!     }
//! });
//!
//! worker.start()?;
//! worker.stop(true, true);
//! assert!(!worker.is_alive());
//! # Ok::<(), tether::thread::ThreadError>(())
//! ```

mod current;
pub mod main_marker;
mod managed;
mod task;

pub use current::current_name;
pub use main_marker::{MainThreadMarker, init_main_thread, is_main_thread, main_thread};
pub use managed::{ManagedThread, ThreadConfig, ThreadState};
pub use task::{Task, TaskContext};

/// Errors reported by [`ManagedThread`] lifecycle calls.
#[derive(Debug, thiserror::Error)]
pub enum ThreadError {
    /// `start` was called while the thread is running or stopping.
    #[error("thread is already running")]
    AlreadyRunning,
    /// `start` was called on a thread that has already stopped.
    #[error("thread has stopped and cannot be restarted")]
    AlreadyStopped,
    /// The OS refused to spawn the thread.
    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] std::io::Error),
}
