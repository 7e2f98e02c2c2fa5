//! Error type shared by every device operation

use std::io;

/// Linux errno values the character-device interface reports.
pub mod errno {
    pub const EFAULT: i32 = 14;
    pub const EAGAIN: i32 = 11;
    pub const EINVAL: i32 = 22;
    /// Kernel-internal "restart the syscall" code returned on signal
    pub const ERESTARTSYS: i32 = 512;
}

/// Why an argument was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidArgument {
    /// Control command code not recognized by the device
    #[error("unknown control command {0:#x}")]
    UnknownCommand(u32),
    /// Seek target outside `0..=capacity`
    #[error("seek position {0} out of range")]
    SeekOutOfRange(i64),
    /// Seek origin the device does not support
    #[error("unsupported seek origin")]
    UnsupportedWhence,
}

/// Error type for fifo operations
///
/// None of these are retried by the device; the caller owns the retry policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FifoError {
    /// Non-blocking call found the fifo empty (read) or full (write)
    #[error("operation would block")]
    WouldBlock,

    /// The caller's interruption signal fired while it was waiting
    #[error("wait interrupted by signal")]
    Interrupted,

    /// The caller-supplied buffer could not be copied to or from
    #[error("bad address in caller buffer")]
    Fault,

    #[error("invalid argument: {0}")]
    InvalidArgument(InvalidArgument),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FifoError {
    /// The errno the character-device interface reports for this error
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::WouldBlock => errno::EAGAIN,
            Self::Interrupted => errno::ERESTARTSYS,
            Self::Fault => errno::EFAULT,
            Self::InvalidArgument(_) | Self::InvalidConfig(_) => errno::EINVAL,
        }
    }
}

impl From<InvalidArgument> for FifoError {
    fn from(e: InvalidArgument) -> Self {
        Self::InvalidArgument(e)
    }
}

impl embedded_io::Error for FifoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Self::Interrupted => embedded_io::ErrorKind::Interrupted,
            Self::InvalidArgument(_) | Self::InvalidConfig(_) => {
                embedded_io::ErrorKind::InvalidInput
            }
            Self::Fault => embedded_io::ErrorKind::InvalidData,
            Self::WouldBlock => embedded_io::ErrorKind::Other,
        }
    }
}

impl From<FifoError> for io::Error {
    fn from(e: FifoError) -> Self {
        let kind = match e {
            FifoError::WouldBlock => io::ErrorKind::WouldBlock,
            FifoError::Interrupted => io::ErrorKind::Interrupted,
            FifoError::Fault => io::ErrorKind::InvalidData,
            FifoError::InvalidArgument(_) | FifoError::InvalidConfig(_) => {
                io::ErrorKind::InvalidInput
            }
        };
        io::Error::new(kind, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_values() {
        assert_eq!(FifoError::WouldBlock.errno(), errno::EAGAIN);
        assert_eq!(FifoError::Interrupted.errno(), errno::ERESTARTSYS);
        assert_eq!(FifoError::Fault.errno(), errno::EFAULT);
        assert_eq!(
            FifoError::from(InvalidArgument::UnknownCommand(7)).errno(),
            errno::EINVAL
        );
    }

    #[test]
    fn test_io_error_kind() {
        let e: io::Error = FifoError::WouldBlock.into();
        assert_eq!(e.kind(), io::ErrorKind::WouldBlock);

        let e: io::Error = FifoError::Interrupted.into();
        assert_eq!(e.kind(), io::ErrorKind::Interrupted);
    }

    #[test]
    fn test_display() {
        let e = FifoError::from(InvalidArgument::UnknownCommand(0x2));
        assert_eq!(e.to_string(), "invalid argument: unknown control command 0x2");
        assert_eq!(
            InvalidArgument::SeekOutOfRange(-1).to_string(),
            "seek position -1 out of range"
        );
    }
}
