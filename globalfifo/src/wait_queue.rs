//! Wait queue
//!
//! A set of callers suspended until the fifo changes state. The device keeps
//! two of them, one for readers waiting on "not empty" and one for writers
//! waiting on "not full".
//!
//! # Blocking without losing wake-ups
//!
//! The workflow of a blocking caller:
//!
//! 10. Caller: lock the device
//! 20. Caller: check the condition (empty for a reader, full for a writer)
//! 30. Caller: `register` in the wait queue, getting a [`WaitTicket`]
//! 40. Caller: unlock the device
//! 50. Caller: `ticket.wait(signal)`
//!
//! 60. Peer: lock the device, change the buffer
//! 70. Peer: `wake_all` on the opposite wait queue
//! 80. Peer: unlock the device
//!
//! 90. Caller: wakes up, goes back to 10 and checks the condition again
//!
//! Steps 20-30 happen under the device lock and so does step 70, therefore a
//! peer can't change the buffer between the caller's check and its
//! registration. A wake-up sent between 40 and 50 is not lost either: it
//! stays in the ticket's oneshot channel until the caller waits on it.
//!
//! Woken callers race for the lock in no particular order. The one that
//! loses may find the condition false again and re-register; that's why
//! step 90 loops instead of assuming the wake-up means "ready".

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::FifoError;

/// A caller suspended in the queue
struct WaitingClient {
    sender: oneshot::Sender<()>,
    debug_hint: String,
}

impl std::fmt::Debug for WaitingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitingClient")
            .field("debug_hint", &self.debug_hint)
            .field("abandoned", &self.sender.is_closed())
            .finish()
    }
}

/// Set of suspended callers, woken all at once
///
/// Not synchronized by itself: the owner keeps it behind the same lock as
/// the condition the callers wait for.
#[derive(Debug)]
pub struct WaitQueue {
    name: &'static str,
    waiting_clients: Vec<WaitingClient>,
}

impl WaitQueue {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            waiting_clients: Vec::new(),
        }
    }

    /// Add a caller to the queue
    ///
    /// Precondition: the caller holds the lock protecting the condition and
    /// has just observed that it must wait.
    pub fn register(&mut self, debug_hint: &str) -> WaitTicket {
        // Callers interrupted since the last wake-up left their entries behind
        self.waiting_clients.retain(|client| !client.sender.is_closed());

        let (sender, receiver) = oneshot::channel();
        self.waiting_clients.push(WaitingClient {
            sender,
            debug_hint: debug_hint.to_string(),
        });
        WaitTicket { receiver }
    }

    /// Wake every caller in the queue and empty it
    ///
    /// Returns how many callers were still waiting to be woken.
    pub fn wake_all(&mut self) -> usize {
        let waiters = std::mem::take(&mut self.waiting_clients);
        let mut woken = 0;

        for waiter in waiters {
            if waiter.sender.send(()).is_ok() {
                woken += 1;
            } else {
                log::debug!(
                    "{}.wake_all: waiter gone (hint: {})",
                    self.name,
                    waiter.debug_hint
                );
            }
        }

        if woken > 0 {
            log::trace!("{}.wake_all: woke {woken} waiter(s)", self.name);
        }
        woken
    }

    /// Number of registered entries, including abandoned ones not yet pruned
    #[must_use]
    pub fn len(&self) -> usize {
        self.waiting_clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waiting_clients.is_empty()
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// The caller's side of a wait queue registration
///
/// Dropping it abandons the registration.
#[must_use = "a wait ticket does nothing unless waited on"]
#[derive(Debug)]
pub struct WaitTicket {
    receiver: oneshot::Receiver<()>,
}

impl WaitTicket {
    /// Suspend until woken or until `signal` fires
    ///
    /// Must be called without holding the device lock. An already-fired
    /// signal returns [`FifoError::Interrupted`] without suspending, and a
    /// signal racing with a wake-up wins.
    pub async fn wait(self, signal: &CancellationToken) -> Result<(), FifoError> {
        tokio::select! {
            biased;
            () = signal.cancelled() => Err(FifoError::Interrupted),
            // A dropped sender means the queue itself went away; let the
            // caller re-check rather than hang.
            _ = self.receiver => Ok(()),
        }
    }
}
