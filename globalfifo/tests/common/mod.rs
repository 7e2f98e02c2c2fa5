#![allow(dead_code)]

use std::time::Duration;

use globalfifo::{Device, FifoConfig};

/// Log to the test writer when `RUST_LOG` is set
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn small_device(capacity: usize) -> Device {
    init_tracing();
    Device::new(FifoConfig::default().with_capacity(capacity)).unwrap()
}

/// Poll `cond` until it holds, failing the test after ~5 seconds
pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..5000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("timed out waiting for: {what}");
}
