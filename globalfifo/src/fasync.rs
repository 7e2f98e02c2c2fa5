//! Asynchronous "data available" notification
//!
//! Open files can ask to be told whenever data is written, instead of
//! blocking in `read`. Each subscriber gets a bounded channel; delivery is a
//! non-blocking `try_send`, so a slow or vanished subscriber never holds up
//! a writer or the other subscribers.
//!
//! A full channel means the subscriber has not yet consumed an earlier
//! `Readable`, so the new one is coalesced into it. A closed channel means
//! the subscriber dropped its receiver; the entry is removed.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::idgen::Handle;

/// Event delivered to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum PollEvent {
    /// New bytes were written and can be read
    Readable,
}

/// Receiving side of a subscription
pub type Subscription = mpsc::Receiver<PollEvent>;

struct Subscriber {
    sender: mpsc::Sender<PollEvent>,
    debug_hint: String,
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("debug_hint", &self.debug_hint)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

/// Subscriber registry, one entry per open handle
///
/// Like [`crate::wait_queue::WaitQueue`], it relies on the device lock.
#[derive(Debug)]
pub struct FasyncQueue {
    subscribers: HashMap<Handle, Subscriber>,
    channel_capacity: usize,
}

impl FasyncQueue {
    /// `channel_capacity` must be non-zero
    #[must_use]
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            subscribers: HashMap::new(),
            channel_capacity,
        }
    }

    /// Register `handle`, replacing any earlier subscription it had
    pub fn subscribe(&mut self, handle: Handle, debug_hint: &str) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.channel_capacity);
        let previous = self.subscribers.insert(
            handle,
            Subscriber {
                sender,
                debug_hint: debug_hint.to_string(),
            },
        );
        if previous.is_some() {
            log::debug!("fasync.subscribe: handle {handle:?} re-subscribed, old channel closed");
        }
        receiver
    }

    /// Returns whether `handle` was subscribed
    pub fn unsubscribe(&mut self, handle: Handle) -> bool {
        self.subscribers.remove(&handle).is_some()
    }

    #[must_use]
    pub fn is_subscribed(&self, handle: Handle) -> bool {
        self.subscribers.contains_key(&handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Send `Readable` to every subscriber, best effort
    ///
    /// Returns the number of subscribers that got a new event queued.
    pub fn notify_readable(&mut self) -> usize {
        let mut delivered = 0;

        self.subscribers.retain(|handle, subscriber| {
            match subscriber.sender.try_send(PollEvent::Readable) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::trace!(
                        "fasync.notify: handle {handle:?} (hint: {}) has a pending event",
                        subscriber.debug_hint
                    );
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    log::debug!(
                        "fasync.notify: handle {handle:?} (hint: {}) receiver dropped, removing",
                        subscriber.debug_hint
                    );
                    false
                }
            }
        });

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_reaches_every_subscriber() {
        let mut fasync = FasyncQueue::new(4);
        let mut rx1 = fasync.subscribe(Handle::new(1), "one");
        let mut rx2 = fasync.subscribe(Handle::new(2), "two");

        assert_eq!(fasync.notify_readable(), 2);
        assert_eq!(rx1.try_recv().unwrap(), PollEvent::Readable);
        assert_eq!(rx2.try_recv().unwrap(), PollEvent::Readable);
        assert!(rx1.try_recv().is_err());
    }

    #[test]
    fn test_full_channel_coalesces() {
        let mut fasync = FasyncQueue::new(1);
        let mut rx = fasync.subscribe(Handle::new(1), "slow");

        assert_eq!(fasync.notify_readable(), 1);
        assert_eq!(fasync.notify_readable(), 0);
        assert!(fasync.is_subscribed(Handle::new(1)));

        assert_eq!(rx.try_recv().unwrap(), PollEvent::Readable);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_is_removed() {
        let mut fasync = FasyncQueue::new(4);
        let rx = fasync.subscribe(Handle::new(1), "gone");
        let mut alive = fasync.subscribe(Handle::new(2), "alive");
        drop(rx);

        assert_eq!(fasync.notify_readable(), 1);
        assert!(!fasync.is_subscribed(Handle::new(1)));
        assert_eq!(alive.try_recv().unwrap(), PollEvent::Readable);
    }

    #[test]
    fn test_resubscribe_replaces_channel() {
        let mut fasync = FasyncQueue::new(4);
        let mut old = fasync.subscribe(Handle::new(1), "old");
        let mut new = fasync.subscribe(Handle::new(1), "new");
        assert_eq!(fasync.len(), 1);

        fasync.notify_readable();
        assert!(old.try_recv().is_err());
        assert_eq!(new.try_recv().unwrap(), PollEvent::Readable);
    }

    #[test]
    fn test_unsubscribe() {
        let mut fasync = FasyncQueue::new(4);
        let _rx = fasync.subscribe(Handle::new(1), "x");
        assert!(fasync.unsubscribe(Handle::new(1)));
        assert!(!fasync.unsubscribe(Handle::new(1)));
        assert_eq!(fasync.notify_readable(), 0);
    }
}
