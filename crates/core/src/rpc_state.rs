//! The per-call record: both stream directions plus the header/trailer protocol.
//!
//! An [`RpcState`] is what the event loop (see [`crate::r#loop`]) keys its
//! [`crate::r#loop::Registry`] by call id. It owns two [`HalfStream`]s -
//! requests flowing client-to-server, responses flowing server-to-client -
//! and the call's metadata protocol: headers, which a server sends at most
//! once and which a client may wait on before consuming the first response,
//! and trailers, which only become visible once the call has reached a
//! terminal state.

use http::HeaderMap;

use crate::error::Status;
use crate::half_stream::{HalfStream, RecvOutcome};

/// A callback invoked once headers have been sent (or the call finished
/// without ever sending any, e.g. a fast `Unimplemented` rejection).
pub type HeaderWaiter = Box<dyn FnOnce(HeaderMap) + Send>;

/// The per-call state shared by both adapters of a single RPC.
pub struct RpcState {
    /// Client-to-server messages.
    pub requests: HalfStream,
    /// Server-to-client messages.
    pub responses: HalfStream,
    headers: HeaderMap,
    header_sent: bool,
    header_waiters: Vec<HeaderWaiter>,
    trailers: HeaderMap,
    finished: Option<Status>,
}

impl RpcState {
    /// A fresh call record with both directions open and no metadata sent.
    #[must_use]
    pub fn new() -> Self {
        Self {
            requests: HalfStream::new(),
            responses: HalfStream::new(),
            headers: HeaderMap::new(),
            header_sent: false,
            header_waiters: Vec::new(),
            trailers: HeaderMap::new(),
            finished: None,
        }
    }

    /// `true` once headers have been sent for this call.
    #[must_use]
    pub fn header_sent(&self) -> bool {
        self.header_sent
    }

    /// Send headers for this call.
    ///
    /// Sending headers a second time is a server-side protocol violation;
    /// callers must not invoke this twice - `ServerStream` enforces it by
    /// sending headers at most once per call, implicitly on first response
    /// send if a handler never calls it explicitly. This method enforces it
    /// defensively and returns [`crate::error::Code::Internal`] rather than
    /// panicking, since a violation here must not be able to take the whole
    /// loop down.
    ///
    /// # Errors
    ///
    /// Returns an error if headers were already sent for this call.
    pub fn send_header(&mut self, headers: HeaderMap) -> Result<(), Status> {
        if self.header_sent {
            return Err(Status::internal("send_header called more than once"));
        }
        self.headers = headers;
        self.header_sent = true;
        for waiter in self.header_waiters.drain(..) {
            waiter(self.headers.clone());
        }
        Ok(())
    }

    /// Block (via callback) until headers are available.
    ///
    /// If headers were already sent, or the call already finished without
    /// ever sending any, the callback runs synchronously with whatever
    /// headers exist (possibly empty). Otherwise it is queued and runs from
    /// inside [`RpcState::send_header`] or [`RpcState::finish`].
    pub fn wait_for_header(&mut self, waiter: HeaderWaiter) {
        if self.header_sent || self.finished.is_some() {
            waiter(self.headers.clone());
        } else {
            self.header_waiters.push(waiter);
        }
    }

    /// Merge additional trailer metadata.
    ///
    /// Trailers accumulate until [`RpcState::finish`] and are only
    /// meaningful to a reader once the call has reached a terminal state.
    pub fn set_trailer(&mut self, trailer: HeaderMap) {
        self.trailers.extend(trailer);
    }

    /// The accumulated trailer metadata.
    #[must_use]
    pub fn trailers(&self) -> &HeaderMap {
        &self.trailers
    }

    /// `true` once [`RpcState::finish`] has been called.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    /// The terminal status, if the call has finished.
    #[must_use]
    pub fn finished_status(&self) -> Option<&Status> {
        self.finished.as_ref()
    }

    /// Bring the call to a terminal state: close both half-streams with
    /// `status`, and release any header waiter that never saw headers sent
    /// (a call can finish before sending headers - the Unimplemented path,
    /// a panic in a handler before its first write - and a blocked header
    /// wait must not hang forever because of it).
    ///
    /// Idempotent: finishing an already-finished call is a no-op.
    pub fn finish(&mut self, status: Status) {
        if self.finished.is_some() {
            return;
        }
        self.finished = Some(status.clone());
        self.requests.close(status.clone());
        self.responses.close(status);
        for waiter in self.header_waiters.drain(..) {
            waiter(self.headers.clone());
        }
    }
}

impl Default for RpcState {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience conversion used by adapters translating a [`RecvOutcome`]
/// into the `Result`-shaped value a blocking `recv` returns.
#[must_use]
pub fn recv_outcome_into_result<T>(
    outcome: RecvOutcome,
    into_typed: impl FnOnce(crate::payload::Payload) -> Result<T, Status>,
) -> Result<Option<T>, Status> {
    match outcome {
        RecvOutcome::Item(payload) => into_typed(payload).map(Some),
        RecvOutcome::Closed(status) if status.is_ok() => Ok(None),
        RecvOutcome::Closed(status) => Err(status),
    }
}
