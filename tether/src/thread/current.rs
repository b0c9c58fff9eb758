//! Thread-local lookup of the managed thread running on the calling thread.

use std::cell::RefCell;
use std::sync::Arc;

use super::task::Shared;

thread_local! {
    static CURRENT: RefCell<Option<Arc<Shared>>> = const { RefCell::new(None) };
}

/// Name of the managed thread executing the caller, if any.
///
/// Returns `None` on threads not spawned by
/// [`ManagedThread::start`](super::ManagedThread::start).
#[must_use]
pub fn current_name() -> Option<String> {
    CURRENT.with(|current| current.borrow().as_ref().map(|shared| shared.name()))
}

/// Registers `shared` as the current managed thread until the guard drops.
pub(super) fn enter(shared: Arc<Shared>) -> CurrentGuard {
    let previous = CURRENT.with(|current| current.replace(Some(shared)));
    CurrentGuard { previous }
}

pub(super) struct CurrentGuard {
    previous: Option<Arc<Shared>>,
}

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        // The slot may already be gone during thread-local teardown.
        let _ = CURRENT.try_with(|current| current.replace(previous));
    }
}
