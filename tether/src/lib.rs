//! Managed worker threads and a bounded packet buffer.
//!
//! - [`thread`]: OS threads with a cooperative start/stop/destroy lifecycle.
//! - [`sync`]: the bounded-wait wake-up signal each managed thread owns.
//! - [`packet`]: a locked circular byte buffer handing typed packets between
//!   a producer and a consumer.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tether::packet::{PacketBuffer, PostcardCodec};
//! use tether::thread::{ManagedThread, TaskContext};
//!
//! let buffer = Arc::new(PacketBuffer::new(1024, PostcardCodec::<u64>::new())?);
//! let producer_buffer = Arc::clone(&buffer);
//!
//! let producer = ManagedThread::new("producer", move |ctx: &TaskContext| {
//!     let mut seq = 0u64;
//!     while !ctx.test_destroy() {
//!         if !producer_buffer.is_busy() && producer_buffer.push(&seq).is_ok() {
//!             seq += 1;
//!         }
//!         ctx.wait_for_any_signal();
//!     }
//! });
//!
//! producer.start()?;
//! while !buffer.has_new_packet() {
//!     std::thread::yield_now();
//! }
//! producer.stop(true, true);
//!
//! assert_eq!(buffer.pop()?, 0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod packet;
pub mod sync;
pub mod thread;
pub mod trace;

pub use trace::init_tracing;
