//! The per-call context types handed to callers and handlers.
//!
//! [`ClientContext`] is what the caller builds and hands to a [`crate::channel::Channel`]
//! invocation: a cancellation token, an optional deadline, outgoing request
//! metadata, and a caller-local value bag. [`ServerContext`] is what a
//! handler receives: the incoming metadata, a cancellation token that fires
//! when the caller's does (or the call otherwise finishes), a *separate*
//! server-local value bag, and - deliberately only reachable through
//! [`ServerContext::client_context`] rather than merged in automatically - a
//! read-only view of the context the client built. A handler that wants to
//! read a value the client attached has to ask for it explicitly; it never
//! shows up by accident in the handler's own [`ServerContext::get`].

use std::time::Duration;

use http::{Extensions, HeaderMap};
use tokio_util::sync::CancellationToken;

/// The address (in-process identity) of the other side of a call.
///
/// There is no network here, so `Peer` carries whatever label the host
/// application finds useful for logging/observability - typically a
/// service or handler name - rather than a socket address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Peer {
    label: String,
}

impl Peer {
    /// A peer identified by an arbitrary label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }

    /// The peer's label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// The context a caller constructs to start a call.
#[derive(Clone)]
pub struct ClientContext {
    cancellation: CancellationToken,
    deadline: Option<Duration>,
    metadata: HeaderMap,
    extensions: Extensions,
    peer: Peer,
}

impl ClientContext {
    /// A fresh context with no deadline, empty metadata, and a cancellation
    /// token the caller owns.
    #[must_use]
    pub fn new(peer: Peer) -> Self {
        Self {
            cancellation: CancellationToken::new(),
            deadline: None,
            metadata: HeaderMap::new(),
            extensions: Extensions::new(),
            peer,
        }
    }

    /// Attach a deadline, measured from when the call is started.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// The configured deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// The token that cancels this call. Cloning it is cheap and shares the
    /// same cancellation signal - this is how [`crate::channel::Channel`]
    /// derives the watcher it races against call completion.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Cancel the call. Idempotent.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// `true` if the call has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Outgoing request metadata, sent as the call's headers.
    #[must_use]
    pub fn metadata(&self) -> &HeaderMap {
        &self.metadata
    }

    /// Mutable access to outgoing request metadata.
    pub fn metadata_mut(&mut self) -> &mut HeaderMap {
        &mut self.metadata
    }

    /// The peer this call is being made to.
    #[must_use]
    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    /// Attach a caller-local value, retrievable with [`ClientContext::get`].
    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(value);
    }

    /// Retrieve a caller-local value previously attached with [`ClientContext::insert`].
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }
}

/// The context a handler receives for an inbound call.
pub struct ServerContext {
    cancellation: CancellationToken,
    metadata: HeaderMap,
    extensions: Extensions,
    peer: Peer,
    client: ClientContext,
}

impl ServerContext {
    /// Build a server context derived from the client context that started
    /// the call. The two get independent value bags; only `metadata` and the
    /// cancellation signal cross over automatically.
    #[must_use]
    pub fn from_client(client: ClientContext) -> Self {
        Self {
            cancellation: client.cancellation_token(),
            metadata: client.metadata.clone(),
            extensions: Extensions::new(),
            peer: client.peer.clone(),
            client,
        }
    }

    /// The token that fires when the caller cancels (or the call finishes -
    /// see [`crate::rpc_state::RpcState::finish`]).
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// `true` if the call has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// The incoming request metadata (the client's headers).
    #[must_use]
    pub fn metadata(&self) -> &HeaderMap {
        &self.metadata
    }

    /// The caller's peer.
    #[must_use]
    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    /// Attach a handler-local value, retrievable with [`ServerContext::get`].
    /// This bag is independent of the client's - see the module docs.
    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(value);
    }

    /// Retrieve a handler-local value previously attached with [`ServerContext::insert`].
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    /// Explicit, opt-in access to the client context that started this call.
    /// A handler has to ask for this by name; it is never merged into the
    /// handler's own value bag.
    #[must_use]
    pub fn client_context(&self) -> &ClientContext {
        &self.client
    }
}
