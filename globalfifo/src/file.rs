//! Open file on the fifo device
//!
//! A [`FifoFile`] is what a caller gets from [`Device::open`]. It carries the
//! per-open state: the non-blocking flag, a private seek cursor, the
//! caller's interruption signal, and its async-notification subscription.
//!
//! An interruption is consumed by the call that reports it: once a read or
//! write returns [`FifoError::Interrupted`], the file gets a fresh signal and
//! a plain retry blocks normally again.
//! Releasing (or dropping) it removes the subscription and leaves the queued
//! bytes alone.

use std::fmt;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::device::{CallContext, Device};
use crate::error::{FifoError, InvalidArgument};
use crate::fasync::Subscription;
use crate::idgen::Handle;
use crate::io::{UserSink, UserSource};

/// Options for [`Device::open_with`]
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    nonblocking: bool,
    signal: Option<CancellationToken>,
}

impl OpenOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open in non-blocking mode, like `O_NONBLOCK`
    #[must_use]
    pub fn nonblocking(mut self, nonblocking: bool) -> Self {
        self.nonblocking = nonblocking;
        self
    }

    /// Interruption signal of the opening caller
    #[must_use]
    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    #[must_use]
    pub fn is_nonblocking(&self) -> bool {
        self.nonblocking
    }
}

/// Origin of a seek
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekFrom {
    /// From the start of the buffer
    Absolute(i64),
    /// From the current cursor
    Relative(i64),
}

impl TryFrom<std::io::SeekFrom> for SeekFrom {
    type Error = FifoError;

    fn try_from(pos: std::io::SeekFrom) -> Result<Self, Self::Error> {
        match pos {
            std::io::SeekFrom::Start(offset) => i64::try_from(offset)
                .map(Self::Absolute)
                .map_err(|_| InvalidArgument::SeekOutOfRange(i64::MAX).into()),
            std::io::SeekFrom::Current(offset) => Ok(Self::Relative(offset)),
            std::io::SeekFrom::End(_) => Err(InvalidArgument::UnsupportedWhence.into()),
        }
    }
}

/// Control commands understood by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Discard all queued bytes
    Clear,
}

impl Command {
    /// Raw code of [`Command::Clear`]
    pub const MEM_CLEAR: u32 = 0x01;

    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            Self::Clear => Self::MEM_CLEAR,
        }
    }
}

impl TryFrom<u32> for Command {
    type Error = FifoError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            Self::MEM_CLEAR => Ok(Self::Clear),
            other => Err(InvalidArgument::UnknownCommand(other).into()),
        }
    }
}

/// One open file on the device
///
/// # Thread Safety
///
/// `read`, `write` and `control` take `&self`, so one open file may be
/// shared between tasks (e.g. through an `Arc`); every call still goes
/// through the device lock. `seek` and the flag setters take `&mut self`
/// because the cursor and flags are per-open state, not device state.
pub struct FifoFile {
    device: Device,
    handle: Handle,
    nonblocking: bool,
    pos: u64,
    signal: Mutex<CancellationToken>,
    released: bool,
}

impl FifoFile {
    pub(crate) fn new(device: Device, handle: Handle, options: OpenOptions) -> Self {
        Self {
            device,
            handle,
            nonblocking: options.nonblocking,
            pos: 0,
            signal: Mutex::new(options.signal.unwrap_or_default()),
            released: false,
        }
    }

    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    #[must_use]
    pub fn device(&self) -> &Device {
        &self.device
    }

    #[must_use]
    pub fn is_nonblocking(&self) -> bool {
        self.nonblocking
    }

    /// Toggle non-blocking mode for later calls, like `fcntl(F_SETFL, O_NONBLOCK)`
    pub fn set_nonblocking(&mut self, nonblocking: bool) {
        self.nonblocking = nonblocking;
    }

    /// The interruption signal blocked calls on this file listen to
    ///
    /// Cancelling it interrupts the calls currently waiting, or the next one
    /// that would have to wait. The call reporting the interruption replaces
    /// it with a fresh token, so fetch it again to interrupt a later call.
    #[must_use]
    pub fn signal(&self) -> CancellationToken {
        self.signal.lock().clone()
    }

    pub fn set_signal(&mut self, signal: CancellationToken) {
        *self.signal.get_mut() = signal;
    }

    /// Current seek cursor
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    fn context<'a>(&self, signal: &'a CancellationToken) -> CallContext<'a> {
        CallContext {
            handle: self.handle,
            nonblocking: self.nonblocking,
            signal,
        }
    }

    /// Swap in a fresh signal once an interruption has been reported
    fn consume_interrupt<T>(&self, result: &Result<T, FifoError>) {
        if !matches!(result, Err(FifoError::Interrupted)) {
            return;
        }
        let mut signal = self.signal.lock();
        if signal.is_cancelled() {
            *signal = CancellationToken::new();
            debug!(handle = ?self.handle, "interruption consumed, signal re-armed");
        }
    }

    /// Read up to `dst.capacity()` bytes
    ///
    /// Errors: [`FifoError::WouldBlock`] (empty, non-blocking),
    /// [`FifoError::Interrupted`] (signal while waiting),
    /// [`FifoError::Fault`] (destination not writable).
    pub async fn read<D>(&self, dst: &mut D) -> Result<usize, FifoError>
    where
        D: UserSink + ?Sized,
    {
        let signal = self.signal();
        let result = self.device.read(&self.context(&signal), dst).await;
        self.consume_interrupt(&result);
        result
    }

    /// Read up to `size` bytes into a new vector
    pub async fn read_to_vec(&self, size: usize) -> Result<Vec<u8>, FifoError> {
        let mut buf = vec![0u8; size];
        let n = self.read(buf.as_mut_slice()).await?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Write up to `src.len()` bytes, returning how many were accepted
    ///
    /// Errors: [`FifoError::WouldBlock`] (full, non-blocking),
    /// [`FifoError::Interrupted`] (signal while waiting),
    /// [`FifoError::Fault`] (source not readable).
    pub async fn write<S>(&self, src: &S) -> Result<usize, FifoError>
    where
        S: UserSource + ?Sized,
    {
        let signal = self.signal();
        let result = self.device.write(&self.context(&signal), src).await;
        self.consume_interrupt(&result);
        result
    }

    pub fn control(&self, command: Command) -> Result<(), FifoError> {
        match command {
            Command::Clear => self.device.clear(),
        }
        Ok(())
    }

    /// Raw control entry point, rejects unknown codes
    pub fn ioctl(&self, code: u32) -> Result<(), FifoError> {
        self.control(Command::try_from(code)?)
    }

    /// Move the private cursor
    ///
    /// The target must lie in `0..=capacity`. The cursor has no effect on
    /// `read` and `write`, which always work at the front of the fifo.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, FifoError> {
        let capacity = i64::try_from(self.device.capacity()).unwrap_or(i64::MAX);

        let target = match pos {
            SeekFrom::Absolute(offset) => offset,
            SeekFrom::Relative(offset) => i64::try_from(self.pos)
                .ok()
                .and_then(|current| current.checked_add(offset))
                .ok_or(InvalidArgument::SeekOutOfRange(offset))?,
        };
        if !(0..=capacity).contains(&target) {
            return Err(InvalidArgument::SeekOutOfRange(target).into());
        }

        self.pos = u64::try_from(target).map_err(|_| InvalidArgument::SeekOutOfRange(target))?;
        Ok(self.pos)
    }

    /// Ask for a `Readable` event after every successful write
    ///
    /// Replaces an earlier subscription of this file.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.device.subscribe(self.handle)
    }

    /// Returns whether this file was subscribed
    pub fn unsubscribe(&self) -> bool {
        self.device.unsubscribe(self.handle)
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.device.is_subscribed(self.handle)
    }

    /// Toggle async notification, like `fcntl(F_SETFL, FASYNC)`
    ///
    /// Turning it on returns the new subscription.
    pub fn set_fasync(&self, on: bool) -> Option<Subscription> {
        if on {
            Some(self.subscribe())
        } else {
            self.unsubscribe();
            None
        }
    }

    /// Close the file
    ///
    /// Drops the subscription; the queued bytes stay for other files.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.device.unsubscribe(self.handle);
        debug!(handle = ?self.handle, "release");
    }
}

impl fmt::Debug for FifoFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FifoFile(handle={:?}, nonblocking={}, pos={}, interrupted={})",
            self.handle,
            self.nonblocking,
            self.pos,
            self.signal.lock().is_cancelled()
        )
    }
}

impl Drop for FifoFile {
    fn drop(&mut self) {
        self.release_inner();
    }
}

// Blocking and async byte-stream traits

impl embedded_io::ErrorType for FifoFile {
    type Error = FifoError;
}

impl embedded_io::Read for FifoFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        futures::executor::block_on(FifoFile::read(self, buf))
    }
}

impl embedded_io::Write for FifoFile {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        futures::executor::block_on(FifoFile::write(self, buf))
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl embedded_io::Seek for FifoFile {
    fn seek(&mut self, pos: embedded_io::SeekFrom) -> Result<u64, Self::Error> {
        let pos = match pos {
            embedded_io::SeekFrom::Start(offset) => std::io::SeekFrom::Start(offset),
            embedded_io::SeekFrom::Current(offset) => std::io::SeekFrom::Current(offset),
            embedded_io::SeekFrom::End(offset) => std::io::SeekFrom::End(offset),
        };
        FifoFile::seek(self, SeekFrom::try_from(pos)?)
    }
}

impl embedded_io_async::Read for FifoFile {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        FifoFile::read(self, buf).await
    }
}

impl embedded_io_async::Write for FifoFile {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        FifoFile::write(self, buf).await
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_codes() {
        assert_eq!(Command::try_from(0x01_u32), Ok(Command::Clear));
        assert_eq!(Command::Clear.code(), Command::MEM_CLEAR);
        assert_eq!(
            Command::try_from(0x02_u32),
            Err(FifoError::InvalidArgument(InvalidArgument::UnknownCommand(0x02)))
        );
    }

    #[test]
    fn test_std_seek_from_conversion() {
        assert_eq!(
            SeekFrom::try_from(std::io::SeekFrom::Start(3)),
            Ok(SeekFrom::Absolute(3))
        );
        assert_eq!(
            SeekFrom::try_from(std::io::SeekFrom::Current(-2)),
            Ok(SeekFrom::Relative(-2))
        );
        assert_eq!(
            SeekFrom::try_from(std::io::SeekFrom::End(0)),
            Err(FifoError::InvalidArgument(InvalidArgument::UnsupportedWhence))
        );
    }

    #[test]
    fn test_open_options() {
        let options = OpenOptions::new().nonblocking(true);
        assert!(options.is_nonblocking());
        assert!(!OpenOptions::default().is_nonblocking());
    }
}
