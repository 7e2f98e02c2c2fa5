//! The fifo device
//!
//! One [`Device`] is created when the service starts and is shared by every
//! open file. All mutable state sits behind a single lock:
//!
//! - the [`BufferStore`] with the queued bytes
//! - the two wait queues, readers waiting for data and writers waiting for room
//! - the async-notification subscribers
//!
//! A read or write that can't make progress registers in a wait queue while
//! still holding the lock, releases it, and only then suspends. See
//! [`crate::wait_queue`] for why no wake-up can be lost in between.
//!
//! # Thread Safety
//!
//! `Device` is a cheap `Arc` clone and can be used from any number of threads
//! and async tasks. The lock is a `parking_lot::Mutex` and is never held
//! across an `.await`: every locked section lives in a synchronous helper
//! (`try_read`, `try_write`) that either completes the operation or returns a
//! [`WaitTicket`] to wait on after the guard is gone.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::FifoConfig;
use crate::error::FifoError;
use crate::fasync::{FasyncQueue, Subscription};
use crate::file::{FifoFile, OpenOptions};
use crate::idgen::{Handle, IdGen};
use crate::io::{BadAddress, BufferStore, UserSink, UserSource};
use crate::wait_queue::{WaitQueue, WaitTicket};

/// State guarded by the device lock
struct FifoState {
    store: BufferStore,
    read_waiters: WaitQueue,
    write_waiters: WaitQueue,
    fasync: FasyncQueue,
}

struct DeviceInner {
    state: Mutex<FifoState>,
    config: FifoConfig,
    id_gen: IdGen,
}

/// Per-call parameters of a read or write
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    /// Open file issuing the call, used for logging
    pub handle: Handle,
    /// Fail with [`FifoError::WouldBlock`] instead of waiting
    pub nonblocking: bool,
    /// Fires when the caller is interrupted
    pub signal: &'a CancellationToken,
}

/// Outcome of one locked attempt
enum Attempt {
    Done(usize),
    Blocked(WaitTicket),
}

/// Shared fixed-capacity byte queue
#[derive(Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

impl Device {
    pub fn new(config: FifoConfig) -> Result<Self, FifoError> {
        config.validate()?;
        info!(capacity = config.capacity, "globalfifo device ready");
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: FifoConfig) -> Self {
        let state = FifoState {
            store: BufferStore::new(config.capacity),
            read_waiters: WaitQueue::new("r_wait"),
            write_waiters: WaitQueue::new("w_wait"),
            fasync: FasyncQueue::new(config.notify_depth),
        };
        Self {
            inner: Arc::new(DeviceInner {
                state: Mutex::new(state),
                config,
                id_gen: IdGen::new(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &FifoConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.config.capacity
    }

    /// Bytes currently queued. Only a snapshot: other callers may change it
    /// as soon as the lock is released.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the queued bytes, oldest first
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.inner.state.lock().store.as_slice().to_vec()
    }

    /// Entries in the read wait queue
    #[must_use]
    pub fn waiting_readers(&self) -> usize {
        self.inner.state.lock().read_waiters.len()
    }

    /// Entries in the write wait queue
    #[must_use]
    pub fn waiting_writers(&self) -> usize {
        self.inner.state.lock().write_waiters.len()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().fasync.len()
    }

    /// Open a new file on the device. Never fails.
    #[must_use]
    pub fn open(&self) -> FifoFile {
        self.open_with(OpenOptions::new())
    }

    #[must_use]
    pub fn open_with(&self, options: OpenOptions) -> FifoFile {
        let handle = self.inner.id_gen.next_handle();
        debug!(?handle, nonblocking = options.is_nonblocking(), "open");
        FifoFile::new(self.clone(), handle, options)
    }

    /// Read up to `dst.capacity()` bytes from the front of the fifo
    ///
    /// Waits while the fifo is empty unless `ctx.nonblocking`. Returns the
    /// number of bytes copied, which is only 0 for a zero-sized `dst`.
    pub async fn read<D>(&self, ctx: &CallContext<'_>, dst: &mut D) -> Result<usize, FifoError>
    where
        D: UserSink + ?Sized,
    {
        if dst.capacity() == 0 {
            return Ok(0);
        }

        loop {
            match self.try_read(ctx, dst)? {
                Attempt::Done(count) => return Ok(count),
                Attempt::Blocked(ticket) => {
                    trace!(handle = ?ctx.handle, "read: fifo empty, waiting");
                    if let Err(e) = ticket.wait(ctx.signal).await {
                        debug!(handle = ?ctx.handle, "read: interrupted");
                        return Err(e);
                    }
                }
            }
        }
    }

    fn try_read<D>(&self, ctx: &CallContext<'_>, dst: &mut D) -> Result<Attempt, FifoError>
    where
        D: UserSink + ?Sized,
    {
        let mut state = self.inner.state.lock();

        if state.store.is_empty() {
            if ctx.nonblocking {
                return Err(FifoError::WouldBlock);
            }
            if ctx.signal.is_cancelled() {
                debug!(handle = ?ctx.handle, "read: signal pending, not waiting");
                return Err(FifoError::Interrupted);
            }
            let ticket = state
                .read_waiters
                .register(&format!("read {}", ctx.handle));
            return Ok(Attempt::Blocked(ticket));
        }

        let want = dst.capacity();
        let count = state
            .store
            .take(want, |bytes| dst.copy_from_device(bytes))
            .map_err(|BadAddress| {
                warn!(handle = ?ctx.handle, "read: destination buffer fault");
                FifoError::Fault
            })?;

        debug!(handle = ?ctx.handle, count, current_len = state.store.len(), "read");
        state.write_waiters.wake_all();
        Ok(Attempt::Done(count))
    }

    /// Append up to `src.len()` bytes at the back of the fifo
    ///
    /// Waits while the fifo is full unless `ctx.nonblocking`. On success the
    /// readers are woken and every subscriber gets one `Readable` event. An
    /// empty `src` returns 0 without waking or notifying anyone.
    pub async fn write<S>(&self, ctx: &CallContext<'_>, src: &S) -> Result<usize, FifoError>
    where
        S: UserSource + ?Sized,
    {
        if src.is_empty() {
            return Ok(0);
        }

        loop {
            match self.try_write(ctx, src)? {
                Attempt::Done(count) => return Ok(count),
                Attempt::Blocked(ticket) => {
                    trace!(handle = ?ctx.handle, "write: fifo full, waiting");
                    if let Err(e) = ticket.wait(ctx.signal).await {
                        debug!(handle = ?ctx.handle, "write: interrupted");
                        return Err(e);
                    }
                }
            }
        }
    }

    fn try_write<S>(&self, ctx: &CallContext<'_>, src: &S) -> Result<Attempt, FifoError>
    where
        S: UserSource + ?Sized,
    {
        let mut state = self.inner.state.lock();

        if state.store.is_full() {
            if ctx.nonblocking {
                return Err(FifoError::WouldBlock);
            }
            if ctx.signal.is_cancelled() {
                debug!(handle = ?ctx.handle, "write: signal pending, not waiting");
                return Err(FifoError::Interrupted);
            }
            let ticket = state
                .write_waiters
                .register(&format!("write {}", ctx.handle));
            return Ok(Attempt::Blocked(ticket));
        }

        let count = state
            .store
            .put(src.len(), |region| src.copy_to_device(region))
            .map_err(|BadAddress| {
                warn!(handle = ?ctx.handle, "write: source buffer fault");
                FifoError::Fault
            })?;

        debug!(handle = ?ctx.handle, count, current_len = state.store.len(), "written");
        state.read_waiters.wake_all();

        let notified = state.fasync.notify_readable();
        if notified > 0 {
            trace!(handle = ?ctx.handle, notified, "readable signal sent");
        }
        Ok(Attempt::Done(count))
    }

    /// Drop every queued byte
    ///
    /// Writers waiting for room are woken; they re-check and find it.
    pub fn clear(&self) {
        let mut state = self.inner.state.lock();
        state.store.clear();
        state.write_waiters.wake_all();
        info!("globalfifo is set to zero");
    }

    pub(crate) fn subscribe(&self, handle: Handle) -> Subscription {
        let subscription = self
            .inner
            .state
            .lock()
            .fasync
            .subscribe(handle, &format!("fasync {handle}"));
        debug!(?handle, "subscribed to readable events");
        subscription
    }

    pub(crate) fn unsubscribe(&self, handle: Handle) -> bool {
        let removed = self.inner.state.lock().fasync.unsubscribe(handle);
        if removed {
            debug!(?handle, "unsubscribed from readable events");
        }
        removed
    }

    pub(crate) fn is_subscribed(&self, handle: Handle) -> bool {
        self.inner.state.lock().fasync.is_subscribed(handle)
    }
}

impl Default for Device {
    /// A device with [`FifoConfig::default`], which always validates
    fn default() -> Self {
        Self::from_valid_config(FifoConfig::default())
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        write!(
            f,
            "Device(len={}, capacity={}, {}={}, {}={}, subscribers={})",
            state.store.len(),
            state.store.capacity(),
            state.read_waiters.name(),
            state.read_waiters.len(),
            state.write_waiters.name(),
            state.write_waiters.len(),
            state.fasync.len()
        )
    }
}
