//! Error types shared by every module of the controller.
//!
//! Each failed operation surfaces one `Error` value naming what went wrong.
//! State-machine failures wrap the underlying cause so callers can tell a
//! refused connection apart from a failed spawn.

use std::io;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Transport-level failure classes of the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelErrorKind {
    /// Nothing is listening on the control endpoint.
    Refused,
    /// The peer closed or reset the connection mid-exchange.
    Reset,
    /// Send or receive did not complete within the configured timeout.
    Timeout,
    /// Any other I/O failure.
    Io,
}

impl std::fmt::Display for ChannelErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelErrorKind::Refused => write!(f, "connection refused"),
            ChannelErrorKind::Reset => write!(f, "connection reset"),
            ChannelErrorKind::Timeout => write!(f, "timed out"),
            ChannelErrorKind::Io => write!(f, "i/o error"),
        }
    }
}

/// A failed control-channel exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelError {
    pub kind: ChannelErrorKind,
    pub message: String,
}

impl ChannelError {
    pub fn new(kind: ChannelErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    /// Classify an error raised by the ZeroMQ socket.
    pub fn from_zmq(context: &str, err: zmq::Error) -> Self {
        let kind = match err {
            zmq::Error::ECONNREFUSED => ChannelErrorKind::Refused,
            zmq::Error::ENOTCONN
            | zmq::Error::EHOSTUNREACH
            | zmq::Error::ETERM => ChannelErrorKind::Reset,
            zmq::Error::EAGAIN => ChannelErrorKind::Timeout,
            _ => ChannelErrorKind::Io,
        };
        Self::new(kind, format!("{}: {}", context, err))
    }
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl std::error::Error for ChannelError {}

/// Error type for every public operation of the crate.
#[derive(Debug)]
pub enum Error {
    /// Malformed policy, program, address or argument.
    InvalidArgument(String),
    /// Slot index outside `[0, slot_count)`.
    OutOfRange { index: usize, slot_count: usize },
    /// Something was queried before it was ever set up.
    NotConfigured(String),
    /// The enforcement process could not be started.
    ProcessSpawnFailed { executable: String, source: io::Error },
    /// The control channel failed to complete an exchange.
    Channel(ChannelError),
    /// `activate` failed; the controller state is unchanged.
    ActivationFailed { operation: &'static str, cause: Box<Error> },
    /// `update` failed; the previously active program is still recorded.
    UpdateFailed { operation: &'static str, cause: Box<Error> },
    /// `deactivate` failed; the controller stays active.
    DeactivationFailed { operation: &'static str, cause: Box<Error> },
    /// A state-changing call that needs an active program ran while inactive.
    NotActive(&'static str),
    /// `activate` ran while a program is still enforced on `interface`.
    AlreadyActive { operation: &'static str, interface: String },
    /// The collector was asked to stop before it was ever started.
    NotRunning(&'static str),
    /// The device profile does not support the requested feature.
    Unsupported(String),
    /// Configuration could not be loaded or is invalid.
    Config(String),
    /// Debugfs or device query failure.
    Device(String),
    /// One CSI sample could not be acquired.
    SampleFailed(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::OutOfRange { index, slot_count } => {
                write!(f, "Slot index {} out of range (slot count {})", index, slot_count)
            }
            Error::NotConfigured(msg) => write!(f, "Not configured: {}", msg),
            Error::ProcessSpawnFailed { executable, source } => {
                write!(f, "Failed to spawn {}: {}", executable, source)
            }
            Error::Channel(err) => write!(f, "Control channel error: {}", err),
            Error::ActivationFailed { operation, cause } => write!(f, "{} failed: {}", operation, cause),
            Error::UpdateFailed { operation, cause } => write!(f, "{} failed: {}", operation, cause),
            Error::DeactivationFailed { operation, cause } => write!(f, "{} failed: {}", operation, cause),
            Error::NotActive(operation) => write!(f, "{} requires an active MAC program", operation),
            Error::AlreadyActive { operation, interface } => {
                write!(f, "{} requires deactivating the MAC program on {} first", operation, interface)
            }
            Error::NotRunning(operation) => write!(f, "{}: CSI collector was never started", operation),
            Error::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Device(msg) => write!(f, "Device error: {}", msg),
            Error::SampleFailed(msg) => write!(f, "CSI sample failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ProcessSpawnFailed { source, .. } => Some(source),
            Error::Channel(err) => Some(err),
            Error::ActivationFailed { cause, .. }
            | Error::UpdateFailed { cause, .. }
            | Error::DeactivationFailed { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

impl From<ChannelError> for Error {
    fn from(err: ChannelError) -> Self {
        Error::Channel(err)
    }
}

impl Error {
    /// Name of the operation a state-machine wrapper refers to, if any.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Error::ActivationFailed { operation, .. }
            | Error::UpdateFailed { operation, .. }
            | Error::DeactivationFailed { operation, .. }
            | Error::AlreadyActive { operation, .. }
            | Error::NotActive(operation)
            | Error::NotRunning(operation) => Some(*operation),
            _ => None,
        }
    }

    /// The wrapped cause of a state-machine failure.
    pub fn cause(&self) -> Option<&Error> {
        match self {
            Error::ActivationFailed { cause, .. }
            | Error::UpdateFailed { cause, .. }
            | Error::DeactivationFailed { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_channel_error_classification() {
        assert_eq!(ChannelError::from_zmq("connect", zmq::Error::ECONNREFUSED).kind, ChannelErrorKind::Refused);
        assert_eq!(ChannelError::from_zmq("recv", zmq::Error::ETERM).kind, ChannelErrorKind::Reset);
        assert_eq!(ChannelError::from_zmq("recv", zmq::Error::EAGAIN).kind, ChannelErrorKind::Timeout);

        let err = ChannelError::from_zmq("send", zmq::Error::EFSM);
        assert_eq!(err.kind, ChannelErrorKind::Io);
        assert!(err.message.starts_with("send: "));
    }

    #[test]
    fn test_wrapper_carries_operation_and_cause() {
        let err = Error::UpdateFailed {
            operation: "update",
            cause: Box::new(Error::Channel(ChannelError::new(ChannelErrorKind::Timeout, "recv"))),
        };
        assert_eq!(err.operation(), Some("update"));
        assert!(matches!(err.cause(), Some(Error::Channel(_))));
        assert!(err.source().is_some());
        let text = err.to_string();
        assert!(text.starts_with("update failed"), "unexpected message: {}", text);
        assert!(text.contains("timed out"));
    }
}
