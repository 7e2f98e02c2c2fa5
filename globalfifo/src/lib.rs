pub mod config;
pub mod device;
pub mod error;
pub mod fasync;
pub mod file;
pub mod idgen;
pub mod io;
pub mod wait_queue;

// Re-export the device surface for convenience
pub use device::{CallContext, Device};
pub use file::{Command, FifoFile, OpenOptions, SeekFrom};

// Re-export configuration and errors
pub use config::FifoConfig;
pub use error::{FifoError, InvalidArgument};

// Re-export notification types
pub use fasync::{PollEvent, Subscription};

pub use idgen::Handle;
pub use io::{BadAddress, UserSink, UserSource};

// Cancellation token used as the caller's interruption signal
pub use tokio_util::sync::CancellationToken;
