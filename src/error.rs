//! Error taxonomy shared by the reactive primitives, the filter chain and the transport.
//!
//! # Design Decisions
//! - One error type with a `kind` instead of a type per failure, so the exception
//!   mapper can classify any failure that reaches it
//! - Suppressed causes are explicit data, attached with [`Error::with_suppressed`]
//! - Panic payloads are turned back into errors at the exception-mapping boundary

use std::any::Any;
use std::fmt;

/// Classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A task or connection was rejected by an executor (resource exhaustion).
    Rejected,
    /// Payload serialization or deserialization failed.
    Serialization,
    /// A reactive signal was delivered out of contract.
    ProtocolViolation,
    /// The server or client was configured in a way that can never work.
    IllegalConfiguration,
    /// Socket level failure (bind, accept, connect).
    Transport,
    /// The operation was cancelled before it produced a result.
    Cancelled,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Stable lowercase label, used for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Rejected => "rejected",
            ErrorKind::Serialization => "serialization",
            ErrorKind::ProtocolViolation => "protocol_violation",
            ErrorKind::IllegalConfiguration => "illegal_configuration",
            ErrorKind::Transport => "transport",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error carried through `Single`, `Publisher` and the filter chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    suppressed: Vec<Error>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            suppressed: Vec::new(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Rejected, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    pub fn protocol_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProtocolViolation, message)
    }

    pub fn illegal_configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IllegalConfiguration, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Causes that were superseded by this error, oldest first.
    pub fn suppressed(&self) -> &[Error] {
        &self.suppressed
    }

    /// Attach `cause` as a suppressed cause of `self`.
    pub fn with_suppressed(mut self, cause: Error) -> Self {
        self.suppressed.push(cause);
        self
    }

    /// Display adapter that also renders the suppressed causes, recursively.
    ///
    /// `Display` on `Error` itself shows only `kind: message`.
    pub fn report(&self) -> ErrorReport<'_> {
        ErrorReport(self)
    }

    /// Recover an error from a panic payload.
    ///
    /// Code that wants a specific classification for a synchronous failure can
    /// `std::panic::panic_any(Error::rejected(..))`; string payloads become
    /// [`ErrorKind::Internal`].
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        match payload.downcast::<Error>() {
            Ok(err) => *err,
            Err(payload) => {
                let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
                    (*s).to_string()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "panic with non-string payload".to_string()
                };
                Self::internal(format!("panicked: {}", message))
            }
        }
    }
}

/// See [`Error::report`].
#[derive(Debug, Clone, Copy)]
pub struct ErrorReport<'a>(&'a Error);

impl fmt::Display for ErrorReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        if self.0.suppressed.is_empty() {
            return Ok(());
        }
        f.write_str(" (suppressed: ")?;
        for (i, cause) in self.0.suppressed.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", cause.report())?;
        }
        f.write_str(")")
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::transport(err.to_string())
    }
}
