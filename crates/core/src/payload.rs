//! Type-erased call payloads.
//!
//! The engine never knows the concrete request/response types a handler
//! deals in - that is host-application business, not channel-plumbing
//! business. Every message that flows through a [`crate::half_stream::HalfStream`]
//! is therefore held as a [`Payload`], a thin wrapper around `Box<dyn Any + Send>`
//! in the same spirit as a request-scoped type map: it doesn't know what's
//! inside, only how to hand it back out to whoever asks for the right type.

use std::any::Any;
use std::fmt::{self, Debug, Formatter};

use crate::error::Status;

/// An opaque, type-erased call message.
///
/// `Payload` is constructed from any `T: Send + 'static` and recovered via
/// [`Payload::downcast`] or [`Payload::downcast_ref`]. A mismatched downcast
/// is a programming error on the caller's part (the handler and its client
/// disagree about the method's message types) and is reported as
/// [`crate::error::Code::Internal`] rather than panicking, so a misbehaving
/// handler can't take the event loop down with it.
pub struct Payload(Box<dyn Any + Send>);

impl Payload {
    /// Wrap a concrete value as an opaque payload.
    pub fn new<T: Send + 'static>(value: T) -> Self {
        Self(Box::new(value))
    }

    /// Recover the concrete value, consuming the payload.
    ///
    /// # Errors
    ///
    /// Returns the payload back (as `Err`) if `T` does not match the type it
    /// was constructed with - callers that want a `Status` instead should use
    /// [`Payload::into_typed`].
    pub fn downcast<T: 'static>(self) -> Result<T, Self> {
        self.0.downcast::<T>().map(|b| *b).map_err(Self)
    }

    /// Recover the concrete value as a `Status::internal` on type mismatch.
    ///
    /// # Errors
    ///
    /// Returns `Status::internal` if `T` does not match the type the payload
    /// was constructed with.
    pub fn into_typed<T: 'static>(self) -> Result<T, Status> {
        self.downcast().map_err(|_| {
            Status::internal(format!(
                "payload type mismatch: expected {}",
                std::any::type_name::<T>()
            ))
        })
    }

    /// Borrow the concrete value without consuming the payload.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl Debug for Payload {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Payload").field(&"<opaque>").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Msg(u32);

    #[test]
    fn downcast_recovers_the_original_value() {
        let payload = Payload::new(Msg(7));
        assert_eq!(payload.downcast::<Msg>().unwrap(), Msg(7));
    }

    #[test]
    fn downcast_with_wrong_type_returns_the_payload_back() {
        let payload = Payload::new(Msg(7));
        let payload = payload.downcast::<String>().unwrap_err();
        assert_eq!(payload.downcast::<Msg>().unwrap(), Msg(7));
    }

    #[test]
    fn into_typed_reports_internal_status_on_mismatch() {
        let payload = Payload::new(Msg(7));
        let err = payload.into_typed::<String>().unwrap_err();
        assert_eq!(err.code(), crate::error::Code::Internal);
    }
}
