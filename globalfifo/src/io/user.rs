//! Caller-side buffers
//!
//! Reads copy device bytes into a [`UserSink`], writes copy from a
//! [`UserSource`]. Either copy may fail, in which case the operation reports
//! [`FifoError::Fault`](crate::FifoError::Fault) and the device is untouched.

/// The caller buffer could not be accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadAddress;

/// Destination of a read
pub trait UserSink {
    /// Maximum number of bytes the read may deliver
    fn capacity(&self) -> usize;

    /// Copy `src` to the start of the buffer. `src.len() <= capacity()`.
    fn copy_from_device(&mut self, src: &[u8]) -> Result<(), BadAddress>;
}

/// Source of a write
pub trait UserSource {
    /// Number of bytes the caller offers
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `dst` with the first `dst.len()` bytes. `dst.len() <= len()`.
    fn copy_to_device(&self, dst: &mut [u8]) -> Result<(), BadAddress>;
}

impl UserSink for [u8] {
    fn capacity(&self) -> usize {
        self.len()
    }

    fn copy_from_device(&mut self, src: &[u8]) -> Result<(), BadAddress> {
        self.get_mut(..src.len())
            .ok_or(BadAddress)?
            .copy_from_slice(src);
        Ok(())
    }
}

impl UserSource for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn copy_to_device(&self, dst: &mut [u8]) -> Result<(), BadAddress> {
        dst.copy_from_slice(self.get(..dst.len()).ok_or(BadAddress)?);
        Ok(())
    }
}

impl<const N: usize> UserSink for [u8; N] {
    fn capacity(&self) -> usize {
        N
    }

    fn copy_from_device(&mut self, src: &[u8]) -> Result<(), BadAddress> {
        self.as_mut_slice().copy_from_device(src)
    }
}

impl<const N: usize> UserSource for [u8; N] {
    fn len(&self) -> usize {
        N
    }

    fn copy_to_device(&self, dst: &mut [u8]) -> Result<(), BadAddress> {
        self.as_slice().copy_to_device(dst)
    }
}

impl UserSink for Vec<u8> {
    fn capacity(&self) -> usize {
        Vec::len(self)
    }

    fn copy_from_device(&mut self, src: &[u8]) -> Result<(), BadAddress> {
        self.as_mut_slice().copy_from_device(src)
    }
}

impl UserSource for Vec<u8> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn copy_to_device(&self, dst: &mut [u8]) -> Result<(), BadAddress> {
        self.as_slice().copy_to_device(dst)
    }
}
