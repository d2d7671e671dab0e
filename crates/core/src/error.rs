//! The status/error taxonomy surfaced at the edges of the engine.
//!
//! Every failure a caller or handler can observe - a malformed method name, a
//! cancelled context, a handler that panics its contract - is represented as
//! a [`Status`]: a [`Code`] plus a human-readable message and an optional
//! underlying cause. `Status` is deliberately not `StdError`-polymorphic the
//! way [`crate::payload::Payload`] is message-polymorphic: there is exactly
//! one error type that crosses the adapter boundary, and everything else
//! (handler panics, I/O errors from a credentials provider) gets folded into
//! it via [`Status::internal`] or [`Status::from_boxed`].

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// A boxed error type for dynamic error handling.
pub type BoxedError = Box<dyn StdError + Send + Sync>;

/// The status code classes a call can terminate with.
///
/// These mirror the gRPC status taxonomy this engine's semantics are drawn
/// from, not because chanrpc speaks gRPC on the wire (it has no wire), but
/// because the classes themselves - "the deadline passed", "no such method",
/// "the caller cancelled" - are protocol-agnostic and worth keeping distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Code {
    /// The call completed successfully. `Status::ok()` is rarely constructed
    /// directly; it exists so `Code` round-trips through a full status value.
    Ok,
    /// The caller's context was cancelled before or during the call.
    Cancelled,
    /// A handler returned an error that doesn't fit any other class.
    Unknown,
    /// The method name or request was malformed.
    InvalidArgument,
    /// The caller's deadline passed before the call finished.
    DeadlineExceeded,
    /// No handler is registered for the requested method.
    Unimplemented,
    /// An invariant of the engine itself was violated (handler protocol
    /// violations, a type-mismatched payload downcast, an unreachable state).
    Internal,
    /// The event loop has already terminated.
    Unavailable,
    /// Per-call credentials were rejected.
    Unauthenticated,
}

impl Code {
    /// `true` for [`Code::Ok`].
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl Display for Code {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "ok",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
            Self::InvalidArgument => "invalid_argument",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Unimplemented => "unimplemented",
            Self::Internal => "internal",
            Self::Unavailable => "unavailable",
            Self::Unauthenticated => "unauthenticated",
        };
        f.write_str(name)
    }
}

/// A status-classified error returned from a call.
///
/// Cloning a `Status` is cheap: the optional cause is held behind an [`Arc`]
/// so the same status can be delivered to several header/trailer output
/// slots (see [`crate::context::ServerContext`]) without re-allocating it
/// per slot.
#[derive(Debug, Clone)]
pub struct Status {
    code: Code,
    message: String,
    source: Option<Arc<BoxedError>>,
}

impl Status {
    /// Build a status from an explicit code and message.
    #[must_use]
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// The successful status. Mostly useful as a default/sentinel value.
    #[must_use]
    pub fn ok() -> Self {
        Self::new(Code::Ok, "")
    }

    /// Attach an underlying cause, returned by [`Status::source`].
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxedError>) -> Self {
        self.source = Some(Arc::new(source.into()));
        self
    }

    /// Build a `Status` from any error, classifying it as [`Code::Internal`]
    /// unless it already downcasts to a `Status`.
    #[must_use]
    pub fn from_boxed(error: BoxedError) -> Self {
        match error.downcast::<Status>() {
            Ok(status) => *status,
            Err(error) => Self::internal(error.to_string()).with_source(error),
        }
    }

    /// The call's classification.
    #[must_use]
    pub const fn code(&self) -> Code {
        self.code
    }

    /// The human-readable message, independent of `code`.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// `true` if this status is [`Code::Ok`].
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.code.is_ok()
    }

    /// `true` if this status is [`Code::Cancelled`].
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.code, Code::Cancelled)
    }
}

macro_rules! constructors {
    ($($name:ident => $code:ident),+ $(,)?) => {
        impl Status {
            $(
                #[doc = concat!("Build a [`Code::", stringify!($code), "`] status.")]
                #[must_use]
                pub fn $name(message: impl Into<String>) -> Self {
                    Self::new(Code::$code, message)
                }
            )+
        }
    };
}

constructors! {
    cancelled => Cancelled,
    unknown => Unknown,
    invalid_argument => InvalidArgument,
    deadline_exceeded => DeadlineExceeded,
    unimplemented => Unimplemented,
    internal => Internal,
    unavailable => Unavailable,
    unauthenticated => Unauthenticated,
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl StdError for Status {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|b| b.as_ref() as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_message() {
        let status = Status::invalid_argument("method name must begin with '/'");
        assert_eq!(
            status.to_string(),
            "invalid_argument: method name must begin with '/'"
        );
    }

    #[test]
    fn from_boxed_preserves_status_identity() {
        let original = Status::unavailable("loop terminated");
        let boxed: BoxedError = Box::new(original.clone());
        let recovered = Status::from_boxed(boxed);
        assert_eq!(recovered.code(), Code::Unavailable);
        assert_eq!(recovered.message(), "loop terminated");
    }

    #[test]
    fn from_boxed_classifies_unknown_errors_as_internal() {
        let boxed: BoxedError = Box::new(std::io::Error::other("disk fell over"));
        let status = Status::from_boxed(boxed);
        assert_eq!(status.code(), Code::Internal);
    }

    #[test]
    fn is_cancelled_only_matches_cancelled_code() {
        assert!(Status::cancelled("client gave up").is_cancelled());
        assert!(!Status::internal("oops").is_cancelled());
    }
}
