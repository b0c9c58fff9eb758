//! Identity of the process's main thread.
//!
//! The marker is explicit state: [`MainThreadMarker::current`] captures the
//! calling thread, so tests can build as many "main" contexts as they need.
//! The process-wide marker is installed once with [`init_main_thread`] and read
//! through [`main_thread`] / [`is_main_thread`].

use std::sync::OnceLock;
use std::thread::{self, ThreadId};

use crate::trace::debug;

static MAIN_THREAD: OnceLock<MainThreadMarker> = OnceLock::new();

/// Captured identity of one thread treated as "main".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MainThreadMarker {
    id: ThreadId,
}

impl MainThreadMarker {
    /// Captures the calling thread.
    #[must_use]
    pub fn current() -> Self {
        Self {
            id: thread::current().id(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> ThreadId {
        self.id
    }

    /// Returns `true` if the caller runs on the captured thread.
    #[must_use]
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.id
    }
}

/// Installs the calling thread as the process main thread.
///
/// Only the first call installs a marker; later calls return the one already
/// installed, whichever thread they come from.
pub fn init_main_thread() -> MainThreadMarker {
    *MAIN_THREAD.get_or_init(|| {
        let marker = MainThreadMarker::current();
        debug!(thread_id = ?marker.id, "main thread marker installed");
        marker
    })
}

/// The installed process main-thread marker, if [`init_main_thread`] has run.
#[must_use]
pub fn main_thread() -> Option<MainThreadMarker> {
    MAIN_THREAD.get().copied()
}

/// Returns `true` if the caller is the installed main thread.
///
/// Always `false` before [`init_main_thread`] has been called.
#[must_use]
pub fn is_main_thread() -> bool {
    main_thread().is_some_and(|marker| marker.is_current())
}
