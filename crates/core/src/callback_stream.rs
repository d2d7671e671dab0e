//! The callback-native facade.
//!
//! [`CallStream`] is for code that already runs on the event loop task - a
//! handler invoked directly from inside a [`crate::r#loop::Task`] closure
//! rather than from its own `tokio` task - and wants to read and write a
//! call's streams without paying for a round trip through a
//! [`tokio::sync::oneshot`] it doesn't need. Every method here takes a
//! `&mut crate::r#loop::Registry` the caller already holds and mutates the
//! [`crate::rpc_state::RpcState`] directly and synchronously; there is no
//! `.await` anywhere in this module.
//!
//! Most handlers should prefer [`crate::server_stream::ServerStream`], which
//! runs on its own task and can genuinely suspend. This facade exists for
//! the narrow case of trusted, non-blocking glue that the host application
//! runs inline with other loop bookkeeping - registering a handler's first
//! response before the caller's first `recv` even reaches the loop, for
//! instance.

use http::HeaderMap;

use crate::error::Status;
use crate::half_stream::RecvOutcome;
use crate::payload::Payload;
use crate::r#loop::{CallId, Registry};

/// A synchronous, in-loop view of one call's streams.
pub struct CallStream<'a> {
    registry: &'a mut Registry,
    call_id: CallId,
}

impl<'a> CallStream<'a> {
    /// Borrow a call's streams out of a registry already owned by the
    /// current loop task.
    ///
    /// # Panics
    ///
    /// Panics if `call_id` is not currently registered - a `CallStream`
    /// is only ever constructed from inside a `Task` that just looked the
    /// call up, so an unregistered id here means the host application is
    /// holding onto a stale handle past the call's teardown.
    #[must_use]
    pub fn new(registry: &'a mut Registry, call_id: CallId) -> Self {
        assert!(registry.get_mut(call_id).is_some(), "call_id not registered");
        Self { registry, call_id }
    }

    /// Send a request message, delivering synchronously to a pending
    /// receiver if one is already waiting.
    ///
    /// # Errors
    ///
    /// Returns the error from [`crate::half_stream::HalfStream::send`].
    pub fn send_request(&mut self, value: impl Send + 'static) -> Result<(), Status> {
        self.state().requests.send(Payload::new(value))
    }

    /// Send a response message, delivering synchronously to a pending
    /// receiver if one is already waiting.
    ///
    /// # Errors
    ///
    /// Returns the error from [`crate::half_stream::HalfStream::send`].
    pub fn send_response(&mut self, value: impl Send + 'static) -> Result<(), Status> {
        self.state().responses.send(Payload::new(value))
    }

    /// Register a callback for the next request message.
    pub fn recv_request(&mut self, on_outcome: impl FnOnce(RecvOutcome) + Send + 'static) {
        self.state().requests.recv(Box::new(on_outcome));
    }

    /// Register a callback for the next response message.
    pub fn recv_response(&mut self, on_outcome: impl FnOnce(RecvOutcome) + Send + 'static) {
        self.state().responses.recv(Box::new(on_outcome));
    }

    /// Send headers for this call.
    ///
    /// # Errors
    ///
    /// Returns the error from [`crate::rpc_state::RpcState::send_header`].
    pub fn send_header(&mut self, headers: HeaderMap) -> Result<(), Status> {
        self.state().send_header(headers)
    }

    /// Merge additional trailer metadata.
    pub fn set_trailer(&mut self, trailer: HeaderMap) {
        self.state().set_trailer(trailer);
    }

    /// Bring the call to a terminal state, closing both directions.
    pub fn finish(&mut self, status: Status) {
        self.state().finish(status);
    }

    fn state(&mut self) -> &mut crate::rpc_state::RpcState {
        self.registry
            .get_mut(self.call_id)
            .expect("constructor already verified the call is registered")
    }
}
