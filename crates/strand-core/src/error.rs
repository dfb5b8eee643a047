//! Error types for the strand engine

use core::fmt;

/// Result type for engine setup and per-connection resource operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type for the async I/O primitives
pub type IoResult<T> = Result<T, IoError>;

/// Errors raised while building or running the engine.
///
/// Variants carry the raw OS errno where one exists. Listener and
/// self-pipe failures are fatal to the process; registration and stack
/// failures are fatal only to the connection they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// getaddrinfo/socket/bind/listen failed for the listening socket
    Listener(i32),

    /// No address candidate could be bound
    BindExhausted,

    /// epoll instance creation failed
    Notifier(i32),

    /// Self-pipe creation failed
    SelfPipe(i32),

    /// Registering an fd with the notifier failed
    Register(i32),

    /// Task stack allocation failed
    StackExhausted,

    /// Invalid engine configuration
    InvalidConfig(&'static str),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Listener(e) => write!(f, "listener setup failed (errno {})", e),
            EngineError::BindExhausted => write!(f, "no listen address could be bound"),
            EngineError::Notifier(e) => write!(f, "notifier creation failed (errno {})", e),
            EngineError::SelfPipe(e) => write!(f, "self-pipe creation failed (errno {})", e),
            EngineError::Register(e) => write!(f, "fd registration failed (errno {})", e),
            EngineError::StackExhausted => write!(f, "task stack allocation failed"),
            EngineError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

/// Errors surfaced by the async I/O primitives.
///
/// Would-block and interrupts are retried inside the primitives and
/// never escape. `Os` carries the raw errno of a permanent failure;
/// a peer reset shows up here as `Os(ECONNRESET)` or `Os(EPIPE)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoError {
    /// The per-call receive timeout elapsed
    Timeout,

    /// Permanent OS error (raw errno)
    Os(i32),
}

impl IoError {
    /// Raw errno for `Os` errors, 0 otherwise
    pub fn errno(&self) -> i32 {
        match self {
            IoError::Timeout => 0,
            IoError::Os(e) => *e,
        }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoError::Timeout => write!(f, "operation timed out"),
            IoError::Os(e) => write!(f, "I/O error (errno {})", e),
        }
    }
}

impl std::error::Error for IoError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = EngineError::StackExhausted;
        assert_eq!(format!("{}", e), "task stack allocation failed");

        let e = EngineError::Register(9);
        assert_eq!(format!("{}", e), "fd registration failed (errno 9)");

        let e = IoError::Timeout;
        assert_eq!(format!("{}", e), "operation timed out");
    }

    #[test]
    fn test_io_error_errno() {
        assert_eq!(IoError::Os(104).errno(), 104);
        assert_eq!(IoError::Timeout.errno(), 0);
    }
}
