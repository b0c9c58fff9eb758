//! Bounded packet buffer for handing typed elements between threads.
//!
//! A [`PacketBuffer`] is a locked circular byte buffer of fixed capacity. Each
//! element is encoded by an injected [`PacketCodec`] and stored as a framed
//! packet:
//!
//! ```text
//! ┌──────────────────┬─────────────────────┐
//! │ len: u32 (LE)    │ payload: len bytes  │
//! └──────────────────┴─────────────────────┘
//! ```
//!
//! so a packet occupies [`PACKET_HEADER_LEN`] plus its payload length.
//!
//! # Capacity
//!
//! The buffer is *busy* while the unread bytes fill the whole capacity.
//! Capacity is reclaimed as packets are popped, so busy clears after a pop, as
//! well as after [`PacketBuffer::flush`]. Pushing never blocks: a packet that
//! does not fit is rejected with [`PacketError::Full`] and the buffer is left
//! unchanged. Backpressure is the producer's job, typically by checking
//! [`PacketBuffer::is_busy`] first.
//!
//! # Example
//!
//! ```
//! use tether::packet::{BytesCodec, PacketBuffer, PacketError};
//!
//! let buffer = PacketBuffer::new(16, BytesCodec)?;
//!
//! buffer.push(&vec![1, 2, 3, 4])?;
//! buffer.push(&vec![5, 6, 7, 8])?;
//! assert!(buffer.is_busy());
//! assert!(matches!(buffer.push(&vec![9]), Err(PacketError::Full { .. })));
//!
//! assert_eq!(buffer.pop()?, vec![1, 2, 3, 4]);
//! assert!(!buffer.is_busy());
//! # Ok::<(), PacketError>(())
//! ```

mod codec;
mod ring;

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::trace::{debug, trace};

pub use codec::{BytesCodec, CodecError, PacketCodec, PostcardCodec};
use ring::ByteRing;

/// Bytes of length header in front of every packet.
pub const PACKET_HEADER_LEN: usize = size_of::<u32>();

/// Errors reported by [`PacketBuffer`] operations.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    /// `pop` on a buffer with no unread packets.
    #[error("packet buffer is empty")]
    Empty,
    /// The framed packet does not fit in the free space.
    #[error("packet buffer is full: need {needed} bytes, have {available}")]
    Full { needed: usize, available: usize },
    /// The framed packet is larger than the whole buffer.
    #[error("packet of {len} bytes exceeds buffer capacity of {capacity}")]
    TooLarge { len: usize, capacity: usize },
    /// The buffer was created with a capacity of zero.
    #[error("packet buffer capacity must be non-zero")]
    ZeroCapacity,
    /// The codec failed to encode or decode an element.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

struct Inner<C> {
    ring: ByteRing,
    codec: C,
    /// Reused encode/decode staging area.
    scratch: Vec<u8>,
    packets: usize,
}

/// Fixed-capacity circular buffer of codec-encoded packets.
///
/// Every operation except [`is_busy`](Self::is_busy) takes the buffer's lock.
/// Share it between one producer and one consumer behind an [`Arc`], or split
/// it with [`channel`].
pub struct PacketBuffer<C: PacketCodec> {
    inner: Mutex<Inner<C>>,
    /// Mirrors `ring.is_full()`, readable without the lock.
    busy: AtomicBool,
    capacity: usize,
}

impl<C: PacketCodec> PacketBuffer<C> {
    /// Creates an empty buffer of `max_buffer_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::ZeroCapacity`] if `max_buffer_size` is zero.
    pub fn new(max_buffer_size: usize, codec: C) -> Result<Self, PacketError> {
        if max_buffer_size == 0 {
            return Err(PacketError::ZeroCapacity);
        }

        debug!(capacity = max_buffer_size, "packet buffer created");

        Ok(Self {
            inner: Mutex::new(Inner {
                ring: ByteRing::new(max_buffer_size),
                codec,
                scratch: Vec::new(),
                packets: 0,
            }),
            busy: AtomicBool::new(false),
            capacity: max_buffer_size,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner<C>> {
        // Cursor updates happen after every fallible step, so a panic inside a
        // codec leaves the ring consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_busy(&self, ring: &ByteRing) {
        self.busy.store(ring.is_full(), Ordering::Release);
    }

    /// Encodes `item` and appends it as one packet.
    ///
    /// # Errors
    ///
    /// - [`PacketError::Codec`] if the codec rejects `item`.
    /// - [`PacketError::TooLarge`] if the packet can never fit.
    /// - [`PacketError::Full`] if it does not fit right now.
    ///
    /// The buffer is unchanged on error.
    pub fn push(&self, item: &C::Item) -> Result<(), PacketError> {
        let mut guard = self.lock();
        let Inner {
            ring,
            codec,
            scratch,
            packets,
        } = &mut *guard;

        scratch.clear();
        codec.encode(item, scratch)?;

        let len = PACKET_HEADER_LEN + scratch.len();
        let header = match u32::try_from(scratch.len()) {
            Ok(header) if len <= self.capacity => header,
            _ => {
                return Err(PacketError::TooLarge {
                    len,
                    capacity: self.capacity,
                });
            }
        };

        let available = ring.free();
        if len > available {
            trace!(needed = len, available, "packet buffer full");
            return Err(PacketError::Full {
                needed: len,
                available,
            });
        }

        ring.write(&header.to_le_bytes());
        ring.write(scratch);
        *packets += 1;
        self.update_busy(ring);

        trace!(len, buffered = ring.len(), "packet pushed");
        Ok(())
    }

    /// Removes the oldest packet and decodes it.
    ///
    /// # Errors
    ///
    /// - [`PacketError::Empty`] if there is nothing to pop.
    /// - [`PacketError::Codec`] if the payload does not decode. The packet is
    ///   consumed either way.
    pub fn pop(&self) -> Result<C::Item, PacketError> {
        let mut guard = self.lock();
        let Inner {
            ring,
            codec,
            scratch,
            packets,
        } = &mut *guard;

        if ring.is_empty() {
            return Err(PacketError::Empty);
        }

        let mut header = [0u8; PACKET_HEADER_LEN];
        ring.read(&mut header);
        let len = u32::from_le_bytes(header) as usize;
        if len > ring.len() {
            // Only reachable if a header was corrupted; nothing after it can
            // be trusted.
            ring.clear();
            *packets = 0;
            self.update_busy(ring);
            return Err(CodecError::Invalid("length header exceeds buffered bytes").into());
        }

        scratch.clear();
        scratch.resize(len, 0);
        ring.read(scratch);
        *packets -= 1;
        self.update_busy(ring);

        trace!(len = PACKET_HEADER_LEN + len, buffered = ring.len(), "packet popped");
        Ok(codec.decode(scratch)?)
    }

    /// Returns `true` if at least one packet is waiting.
    #[must_use]
    pub fn has_new_packet(&self) -> bool {
        !self.lock().ring.is_empty()
    }

    /// Lock-free snapshot: `true` while the unread bytes fill the buffer.
    ///
    /// Meant as a cheap pre-check before [`push`](Self::push); the answer may
    /// change as soon as it is returned.
    #[inline]
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Discards every buffered packet and zeroes the storage.
    pub fn flush(&self) {
        let mut guard = self.lock();
        debug!(discarded = guard.packets, "packet buffer flushed");
        guard.ring.clear();
        guard.packets = 0;
        guard.scratch.clear();
        self.update_busy(&guard.ring);
    }

    /// Total size in bytes, headers included.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Unread bytes, headers included.
    #[must_use]
    pub fn len_bytes(&self) -> usize {
        self.lock().ring.len()
    }

    #[must_use]
    pub fn free_bytes(&self) -> usize {
        self.lock().ring.free()
    }

    /// Number of unread packets.
    #[must_use]
    pub fn packet_count(&self) -> usize {
        self.lock().packets
    }
}

impl<C: PacketCodec> Drop for PacketBuffer<C> {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        inner.ring.clear();
        inner.packets = 0;
    }
}

/// Marker type to opt-out of `Sync` while remaining `Send`.
type PhantomUnsync = PhantomData<Cell<&'static ()>>;

/// Write end of a [`channel`]. `Send` but not `Sync`: one producer.
pub struct PacketProducer<C: PacketCodec> {
    buffer: Arc<PacketBuffer<C>>,
    _unsync: PhantomUnsync,
}

/// Read end of a [`channel`]. `Send` but not `Sync`: one consumer.
pub struct PacketConsumer<C: PacketCodec> {
    buffer: Arc<PacketBuffer<C>>,
    _unsync: PhantomUnsync,
}

/// Creates a buffer and splits it into a producer/consumer pair.
///
/// # Errors
///
/// Returns [`PacketError::ZeroCapacity`] if `max_buffer_size` is zero.
///
/// # Example
///
/// ```
/// use tether::packet::{self, PostcardCodec};
///
/// let (tx, rx) = packet::channel(256, PostcardCodec::<String>::new())?;
///
/// tx.push(&"hello".to_string())?;
/// assert_eq!(rx.pop()?, "hello");
/// # Ok::<(), tether::packet::PacketError>(())
/// ```
pub fn channel<C: PacketCodec>(
    max_buffer_size: usize,
    codec: C,
) -> Result<(PacketProducer<C>, PacketConsumer<C>), PacketError> {
    let buffer = Arc::new(PacketBuffer::new(max_buffer_size, codec)?);

    let producer = PacketProducer {
        buffer: Arc::clone(&buffer),
        _unsync: PhantomData,
    };

    let consumer = PacketConsumer {
        buffer,
        _unsync: PhantomData,
    };

    Ok((producer, consumer))
}

impl<C: PacketCodec> PacketProducer<C> {
    /// See [`PacketBuffer::push`].
    ///
    /// # Errors
    ///
    /// Same as [`PacketBuffer::push`].
    #[inline]
    pub fn push(&self, item: &C::Item) -> Result<(), PacketError> {
        self.buffer.push(item)
    }

    #[inline]
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.buffer.is_busy()
    }

    #[must_use]
    pub fn free_bytes(&self) -> usize {
        self.buffer.free_bytes()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }
}

impl<C: PacketCodec> PacketConsumer<C> {
    /// See [`PacketBuffer::pop`].
    ///
    /// # Errors
    ///
    /// Same as [`PacketBuffer::pop`].
    #[inline]
    pub fn pop(&self) -> Result<C::Item, PacketError> {
        self.buffer.pop()
    }

    #[must_use]
    pub fn has_new_packet(&self) -> bool {
        self.buffer.has_new_packet()
    }

    pub fn flush(&self) {
        self.buffer.flush();
    }

    #[must_use]
    pub fn packet_count(&self) -> usize {
        self.buffer.packet_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(n: u32) -> Vec<u8> {
        n.to_le_bytes().to_vec()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            PacketBuffer::new(0, BytesCodec),
            Err(PacketError::ZeroCapacity)
        ));
    }

    #[test]
    fn test_fifo_within_capacity() {
        let buffer = PacketBuffer::new(256, PostcardCodec::<u64>::new()).unwrap();

        for i in 0..20u64 {
            buffer.push(&(i * 1_000_003)).unwrap();
        }
        assert_eq!(buffer.packet_count(), 20);

        for i in 0..20u64 {
            assert_eq!(buffer.pop().unwrap(), i * 1_000_003);
        }
        assert!(!buffer.has_new_packet());
    }

    #[test]
    fn test_pop_empty() {
        let buffer = PacketBuffer::new(16, BytesCodec).unwrap();
        assert!(matches!(buffer.pop(), Err(PacketError::Empty)));
    }

    #[test]
    fn test_busy_tracks_unread_bytes() {
        let buffer = PacketBuffer::new(16, BytesCodec).unwrap();

        buffer.push(&word(1)).unwrap();
        assert_eq!(buffer.len_bytes(), 8);
        assert!(!buffer.is_busy());

        buffer.push(&word(2)).unwrap();
        assert_eq!(buffer.len_bytes(), 16);
        assert!(buffer.is_busy());

        // Capacity is reclaimed on pop.
        assert_eq!(buffer.pop().unwrap(), word(1));
        assert!(!buffer.is_busy());
        assert_eq!(buffer.free_bytes(), 8);
    }

    #[test]
    fn test_full_leaves_buffer_unchanged() {
        let buffer = PacketBuffer::new(16, BytesCodec).unwrap();

        buffer.push(&word(7)).unwrap();
        let err = buffer.push(&vec![0u8; 5]).unwrap_err();
        assert!(matches!(
            err,
            PacketError::Full {
                needed: 9,
                available: 8
            }
        ));

        assert_eq!(buffer.packet_count(), 1);
        assert_eq!(buffer.pop().unwrap(), word(7));
        assert!(!buffer.has_new_packet());
    }

    #[test]
    fn test_too_large() {
        let buffer = PacketBuffer::new(16, BytesCodec).unwrap();

        let err = buffer.push(&vec![0u8; 13]).unwrap_err();
        assert!(matches!(
            err,
            PacketError::TooLarge {
                len: 17,
                capacity: 16
            }
        ));
        assert!(!buffer.has_new_packet());
    }

    #[test]
    fn test_flush_resets_everything() {
        let buffer = PacketBuffer::new(16, BytesCodec).unwrap();

        while !buffer.is_busy() {
            buffer.push(&word(3)).unwrap();
        }
        buffer.flush();

        assert!(!buffer.is_busy());
        assert!(!buffer.has_new_packet());
        assert_eq!(buffer.packet_count(), 0);
        assert_eq!(buffer.free_bytes(), 16);
    }

    #[test]
    fn test_packets_wrap_around_storage() {
        let buffer = PacketBuffer::new(20, BytesCodec).unwrap();

        // Odd packet sizes force headers and payloads to straddle the end.
        for round in 0u8..40 {
            let payload: Vec<u8> = (0..(round % 7)).map(|b| b ^ round).collect();
            buffer.push(&payload).unwrap();
            assert_eq!(buffer.pop().unwrap(), payload);
        }
        assert_eq!(buffer.len_bytes(), 0);
    }

    #[test]
    fn test_channel_split() {
        let (tx, rx) = channel(64, PostcardCodec::<(u16, String)>::new()).unwrap();

        let producer = std::thread::spawn(move || {
            for i in 0..3u16 {
                tx.push(&(i, format!("msg-{i}"))).unwrap();
            }
        });
        producer.join().unwrap();

        assert_eq!(rx.packet_count(), 3);
        for i in 0..3u16 {
            assert_eq!(rx.pop().unwrap(), (i, format!("msg-{i}")));
        }
        assert!(!rx.has_new_packet());
    }

    struct FailingCodec;

    impl PacketCodec for FailingCodec {
        type Item = u8;

        fn encode(&mut self, item: &u8, out: &mut Vec<u8>) -> Result<(), CodecError> {
            if *item == 0 {
                return Err(CodecError::Invalid("zero"));
            }
            out.push(*item);
            Ok(())
        }

        fn decode(&mut self, payload: &[u8]) -> Result<u8, CodecError> {
            match payload {
                [13] => Err(CodecError::Invalid("unlucky")),
                [b] => Ok(*b),
                _ => Err(CodecError::Invalid("length")),
            }
        }
    }

    #[test]
    fn test_codec_errors() {
        let buffer = PacketBuffer::new(32, FailingCodec).unwrap();

        assert!(matches!(buffer.push(&0), Err(PacketError::Codec(_))));
        assert!(!buffer.has_new_packet());

        buffer.push(&13).unwrap();
        buffer.push(&14).unwrap();
        assert!(matches!(buffer.pop(), Err(PacketError::Codec(_))));
        assert_eq!(buffer.pop().unwrap(), 14);
    }
}
