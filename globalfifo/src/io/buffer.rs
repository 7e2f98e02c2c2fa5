//! Fixed-capacity byte store
//!
//! Holds the fifo bytes contiguously from offset 0. The store has no locking
//! of its own: it lives inside the device state and is only touched while the
//! device lock is held.

use std::fmt;

/// Fixed-capacity byte storage plus occupied length
///
/// # Invariants
///
/// - `0 <= len <= capacity`
/// - `data[..len]` are the live bytes, oldest first
///
/// `take` and `put` copy first and only then adjust `len`, so a failed copy
/// leaves the live bytes and `len` exactly as they were.
pub struct BufferStore {
    data: Box<[u8]>,
    len: usize,
}

impl BufferStore {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len == self.data.len()
    }

    /// Free space in bytes
    #[must_use]
    pub fn room(&self) -> usize {
        self.data.len() - self.len
    }

    /// Remove up to `n` bytes from the front
    ///
    /// `copy_out` receives the bytes about to be removed. If it fails the
    /// store is unchanged and the error is returned. Otherwise the remaining
    /// bytes are shifted to the front and the number removed is returned.
    pub fn take<E>(
        &mut self,
        n: usize,
        copy_out: impl FnOnce(&[u8]) -> Result<(), E>,
    ) -> Result<usize, E> {
        let count = n.min(self.len);
        #[allow(clippy::indexing_slicing)]
        copy_out(&self.data[..count])?;

        self.data.copy_within(count..self.len, 0);
        self.len -= count;
        Ok(count)
    }

    /// Append up to `n` bytes at the end
    ///
    /// `copy_in` fills the reserved region, whose length is
    /// `min(n, room())`. On failure `len` is unchanged, so whatever was
    /// written into the free region is not visible.
    pub fn put<E>(
        &mut self,
        n: usize,
        copy_in: impl FnOnce(&mut [u8]) -> Result<(), E>,
    ) -> Result<usize, E> {
        let count = n.min(self.room());
        let end = self.len + count;
        #[allow(clippy::indexing_slicing)]
        copy_in(&mut self.data[self.len..end])?;

        self.len = end;
        Ok(count)
    }

    /// Zero the storage and drop all live bytes
    pub fn clear(&mut self) {
        self.data.fill(0);
        self.len = 0;
    }

    /// Live bytes, oldest first
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

impl fmt::Debug for BufferStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferStore(len={}, capacity={})", self.len, self.capacity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put_bytes(store: &mut BufferStore, bytes: &[u8]) -> usize {
        store
            .put(bytes.len(), |dst| {
                dst.copy_from_slice(&bytes[..dst.len()]);
                Ok::<_, ()>(())
            })
            .unwrap()
    }

    fn take_bytes(store: &mut BufferStore, n: usize) -> Vec<u8> {
        let mut out = Vec::new();
        store
            .take(n, |src| {
                out.extend_from_slice(src);
                Ok::<_, ()>(())
            })
            .unwrap();
        out
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = BufferStore::new(8);
        assert!(store.is_empty());
        assert!(!store.is_full());
        assert_eq!(store.len(), 0);
        assert_eq!(store.room(), 8);
    }

    #[test]
    fn test_put_is_bounded_by_room() {
        let mut store = BufferStore::new(8);
        assert_eq!(put_bytes(&mut store, b"ABCDEF"), 6);
        assert_eq!(put_bytes(&mut store, b"GHIJ"), 2);
        assert!(store.is_full());
        assert_eq!(store.as_slice(), b"ABCDEFGH");
        assert_eq!(put_bytes(&mut store, b"X"), 0);
    }

    #[test]
    fn test_take_shifts_remaining_bytes() {
        let mut store = BufferStore::new(8);
        put_bytes(&mut store, b"ABCDEFGH");

        assert_eq!(take_bytes(&mut store, 3), b"ABC");
        assert_eq!(store.len(), 5);
        assert_eq!(store.as_slice(), b"DEFGH");

        assert_eq!(take_bytes(&mut store, 100), b"DEFGH");
        assert!(store.is_empty());
    }

    #[test]
    fn test_failed_take_keeps_state() {
        let mut store = BufferStore::new(8);
        put_bytes(&mut store, b"ABCD");

        let result = store.take(2, |_| Err("fault"));
        assert_eq!(result, Err("fault"));
        assert_eq!(store.as_slice(), b"ABCD");
    }

    #[test]
    fn test_failed_put_keeps_state() {
        let mut store = BufferStore::new(8);
        put_bytes(&mut store, b"AB");

        let result = store.put(4, |dst| {
            dst.fill(b'?');
            Err("fault")
        });
        assert_eq!(result, Err("fault"));
        assert_eq!(store.as_slice(), b"AB");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_clear() {
        let mut store = BufferStore::new(4);
        put_bytes(&mut store, b"WXYZ");
        store.clear();
        assert!(store.is_empty());
        assert_eq!(put_bytes(&mut store, b"Q"), 1);
        assert_eq!(store.as_slice(), b"Q");
    }
}
