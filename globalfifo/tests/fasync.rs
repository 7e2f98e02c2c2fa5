mod common;

use common::{small_device, wait_until};
use globalfifo::{FifoError, OpenOptions, PollEvent};

#[tokio::test]
async fn test_subscription() {
    let device = small_device(16);
    let watcher = device.open();
    let writer = device.open();

    let mut rx = watcher.subscribe();
    assert!(watcher.is_subscribed());

    writer.write(b"one").await.unwrap();
    writer.write(b"two").await.unwrap();

    assert_eq!(rx.recv().await, Some(PollEvent::Readable));
    assert_eq!(rx.recv().await, Some(PollEvent::Readable));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_every_subscriber_notified_once_per_write() {
    let device = small_device(16);
    let writer = device.open();
    let watchers: Vec<_> = (0..3).map(|_| device.open()).collect();
    let mut receivers: Vec<_> = watchers.iter().map(|w| w.subscribe()).collect();

    assert_eq!(writer.write(b"payload").await, Ok(7));

    for rx in &mut receivers {
        assert_eq!(rx.try_recv().unwrap(), PollEvent::Readable);
        assert!(rx.try_recv().is_err());
    }
}

#[tokio::test]
async fn test_unsubscribe_and_set_fasync() {
    let device = small_device(16);
    let watcher = device.open();
    let writer = device.open();

    let mut rx = watcher.set_fasync(true).unwrap();
    writer.write(b"a").await.unwrap();
    assert_eq!(rx.try_recv().unwrap(), PollEvent::Readable);

    assert!(watcher.set_fasync(false).is_none());
    assert!(!watcher.is_subscribed());
    assert!(!watcher.unsubscribe());

    writer.write(b"b").await.unwrap();
    // The registry dropped its sender, so the channel reports closed
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_dropped_receiver_does_not_fail_write() {
    let device = small_device(16);
    let gone = device.open();
    let alive = device.open();
    let writer = device.open();

    drop(gone.subscribe());
    let mut rx = alive.subscribe();
    assert_eq!(device.subscriber_count(), 2);

    assert_eq!(writer.write(b"x").await, Ok(1));
    assert_eq!(rx.try_recv().unwrap(), PollEvent::Readable);
    assert_eq!(device.subscriber_count(), 1);
}

#[tokio::test]
async fn test_slow_subscriber_is_coalesced() {
    let device = globalfifo::Device::new(
        globalfifo::FifoConfig::default()
            .with_capacity(16)
            .with_notify_depth(1),
    )
    .unwrap();
    let watcher = device.open();
    let writer = device.open();
    let mut rx = watcher.subscribe();

    for _ in 0..5 {
        assert_eq!(writer.write(b"z").await, Ok(1));
    }

    assert_eq!(rx.try_recv().unwrap(), PollEvent::Readable);
    assert!(rx.try_recv().is_err());
    assert_eq!(device.len(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_subscriber_drives_nonblocking_reader() {
    let device = small_device(16);
    let reader = device.open_with(OpenOptions::new().nonblocking(true));
    let mut rx = reader.subscribe();

    let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
    let consumer = tokio::spawn(async move {
        let mut buf = [0u8; 16];
        assert_eq!(reader.read(&mut buf).await, Err(FifoError::WouldBlock));
        // Signal that the empty read happened
        ready_tx.send(()).unwrap();

        let mut received = Vec::new();
        while received.len() < 6 {
            rx.recv().await.unwrap();
            match reader.read(&mut buf).await {
                Ok(n) => received.extend_from_slice(&buf[..n]),
                Err(FifoError::WouldBlock) => {}
                Err(e) => panic!("unexpected read error: {e}"),
            }
        }
        received
    });

    ready_rx.await.unwrap();
    let writer = device.open();
    writer.write(b"abc").await.unwrap();
    writer.write(b"def").await.unwrap();

    assert_eq!(consumer.await.unwrap(), b"abcdef");
    wait_until("fifo drained", || device.is_empty()).await;
}
