//! Storage and caller-buffer abstractions
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  FifoFile (per-open handle)         │
//! │  - nonblocking flag, seek cursor    │
//! │  - interruption token               │
//! └─────────────────────────────────────┘
//!          │ delegates to
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  Device (coordination layer)        │
//! │  - one lock over the state below    │
//! │  - read/write wait queues           │
//! │  - async-notification subscribers   │
//! └─────────────────────────────────────┘
//!          │ stores bytes in
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  BufferStore                        │
//! │  - fixed capacity, front-aligned    │
//! │  - take() / put() / clear()         │
//! └─────────────────────────────────────┘
//!          ▲
//!          │ copies to/from
//!          ▼
//!   UserSink / UserSource (caller buffers)
//! ```

pub mod buffer;
pub mod user;

pub use buffer::BufferStore;
pub use user::{BadAddress, UserSink, UserSource};
