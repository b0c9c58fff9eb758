//! Synchronization primitives shared by the thread runtime.
//!
//! - [`signal`]: bounded-wait, non-queuing wake-up signal.

pub mod signal;

pub use signal::{DEFAULT_SIGNAL_TIMEOUT, Signal};
