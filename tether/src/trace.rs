//! Diagnostics for managed threads and packet buffers.
//!
//! Built with `--features tracing`, tether reports:
//!
//! - `info`: a managed thread started (with its CPU) or was joined.
//! - `debug`: stop requests with the state they found, task entry and
//!   return on the worker thread, buffer creation and flushes, and the
//!   main-thread marker being installed.
//! - `warn`: lifecycle misuse the API tolerates: `start` on a running or
//!   stopped thread, a task stopping or joining its own thread, dropping a
//!   thread that is still running, and failed CPU pinning.
//! - `error`: a task that panicked, or an OS thread that failed to spawn.
//! - `trace`: every push and pop with its framed length, and pushes refused
//!   because the buffer is full.
//!
//! Events carry the managed thread's name in a `thread` field. Without the
//! feature every macro here expands to nothing and its arguments are never
//! evaluated.

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, defaulting to
/// `tether=trace`, with thread names and uptime stamps.
///
/// Safe to call more than once; only the first call installs anything.
/// Does nothing without the `tracing` feature.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tether=trace"));

    // A test harness may already have installed a subscriber.
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(false)
                .with_line_number(false)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}

#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing"))]
macro_rules! trace_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! debug_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! info_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! warn_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! error_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use debug_noop as debug;
#[cfg(not(feature = "tracing"))]
pub(crate) use error_noop as error;
#[cfg(not(feature = "tracing"))]
pub(crate) use info_noop as info;
#[cfg(not(feature = "tracing"))]
pub(crate) use trace_noop as trace;
#[cfg(not(feature = "tracing"))]
pub(crate) use warn_noop as warn;
