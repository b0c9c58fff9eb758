//! Fixed-size circular byte storage with monotonic cursors.
//!
//! `put` and `get` only ever grow; the physical offset of a cursor is
//! `cursor % capacity`. Callers hold the buffer lock and check `free()` before
//! writing and `len()` before reading.

pub(super) struct ByteRing {
    storage: Box<[u8]>,
    /// Total bytes ever written.
    put: u64,
    /// Total bytes ever read. Never exceeds `put`.
    get: u64,
}

impl ByteRing {
    pub(super) fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            put: 0,
            get: 0,
        }
    }

    #[inline]
    pub(super) fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Buffered bytes not yet read.
    #[inline]
    pub(super) fn len(&self) -> usize {
        (self.put - self.get) as usize
    }

    #[inline]
    pub(super) fn free(&self) -> usize {
        self.capacity() - self.len()
    }

    #[inline]
    pub(super) fn is_empty(&self) -> bool {
        self.put == self.get
    }

    #[inline]
    pub(super) fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }

    #[inline]
    fn offset(&self, cursor: u64) -> usize {
        (cursor % self.capacity() as u64) as usize
    }

    /// Appends `bytes` at `put`, wrapping past the end of storage.
    pub(super) fn write(&mut self, bytes: &[u8]) {
        debug_assert!(bytes.len() <= self.free(), "ring overrun");

        let start = self.offset(self.put);
        let first = bytes.len().min(self.capacity() - start);
        self.storage[start..start + first].copy_from_slice(&bytes[..first]);
        self.storage[..bytes.len() - first].copy_from_slice(&bytes[first..]);

        self.put += bytes.len() as u64;
    }

    /// Fills `out` from `get`, wrapping past the end of storage.
    pub(super) fn read(&mut self, out: &mut [u8]) {
        debug_assert!(out.len() <= self.len(), "ring underrun");

        let start = self.offset(self.get);
        let first = out.len().min(self.capacity() - start);
        out[..first].copy_from_slice(&self.storage[start..start + first]);
        let rest = out.len() - first;
        out[first..].copy_from_slice(&self.storage[..rest]);

        self.get += out.len() as u64;
    }

    /// Zeroes storage and rewinds both cursors.
    pub(super) fn clear(&mut self) {
        self.storage.fill(0);
        self.put = 0;
        self.get = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_contiguous() {
        let mut ring = ByteRing::new(8);

        ring.write(&[1, 2, 3]);
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.free(), 5);

        let mut out = [0u8; 3];
        ring.read(&mut out);
        assert_eq!(out, [1, 2, 3]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_wraps_across_end() {
        let mut ring = ByteRing::new(8);

        ring.write(&[0; 6]);
        let mut discard = [0u8; 6];
        ring.read(&mut discard);

        // Starts at offset 6, spills two bytes past the end.
        ring.write(&[10, 11, 12, 13]);
        assert_eq!(&ring.storage[6..], &[10, 11]);
        assert_eq!(&ring.storage[..2], &[12, 13]);

        let mut out = [0u8; 4];
        ring.read(&mut out);
        assert_eq!(out, [10, 11, 12, 13]);
    }

    #[test]
    fn test_full_and_clear() {
        let mut ring = ByteRing::new(4);

        ring.write(&[9, 9, 9, 9]);
        assert!(ring.is_full());
        assert_eq!(ring.free(), 0);

        ring.clear();
        assert!(ring.is_empty());
        assert!(!ring.is_full());
        assert_eq!(ring.free(), 4);
        assert!(ring.storage.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_many_laps_keep_order() {
        let mut ring = ByteRing::new(7);
        let mut out = [0u8; 3];

        for lap in 0u8..50 {
            let chunk = [lap, lap.wrapping_add(1), lap.wrapping_add(2)];
            ring.write(&chunk);
            ring.read(&mut out);
            assert_eq!(out, chunk);
        }
        assert_eq!(ring.put, 150);
        assert_eq!(ring.get, 150);
    }
}
