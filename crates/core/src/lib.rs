//! The core crate of chanrpc.
//!
//! `chanrpc_core` is the stream coordination engine behind an in-process RPC
//! channel: it makes RPC semantics available as direct function calls within a
//! single process, while routing all stream state through a single-threaded
//! cooperative event loop (see [`r#loop`]). A handler registered on a
//! [`Channel`] can be invoked through that same channel's client-facing call
//! operations with no network, serialization, or transport layer involved.
//!
//! # What lives here
//!
//! - [`half_stream`] — a FIFO message channel with a one-shot pending
//!   receiver; one direction of a bidirectional stream.
//! - [`rpc_state`] — the per-call record owning both directions plus the
//!   header/trailer protocol.
//! - [`r#loop`] — the single-threaded cooperative scheduler both directions
//!   are mutated through.
//! - [`client_stream`] / [`server_stream`] — the adapters that bridge
//!   ordinary tasks to loop tasks, for callers and handlers that want a
//!   conventional `send`/`recv` stream API.
//! - [`callback_stream`] — the callback-native facade for handlers that
//!   already run on the loop and don't want adapter overhead.
//! - [`channel`] — the orchestrator: per-call construction, cancellation
//!   watchers, and teardown.
//!
//! What is deliberately *not* here: a wire format, a serializer, network I/O,
//! service/method dispatch beyond the narrow [`dispatch::ServiceDispatch`]
//! contract, and interceptor chains. Those are host concerns; this crate only
//! promises the concurrency semantics described in its module docs.
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub use async_trait::async_trait;

pub mod callback_stream;
pub mod channel;
pub mod client_stream;
pub mod context;
pub mod credentials;
pub mod dispatch;
mod error;
pub mod half_stream;
pub mod r#loop;
pub mod method_name;
pub mod observability;
pub mod payload;
pub mod rpc_state;
pub mod server_stream;

pub use crate::channel::Channel;
pub use crate::context::{ClientContext, Peer, ServerContext};
pub use crate::error::{Code, Status};
pub use crate::payload::Payload;

/// Result type which has [`Status`] as its error type.
pub type Result<T> = std::result::Result<T, Status>;

/// A list of things most callers of this crate will want in scope.
pub mod prelude {
    pub use crate::callback_stream::CallStream;
    pub use crate::channel::Channel;
    pub use crate::client_stream::ClientStream;
    pub use crate::context::{ClientContext, Peer, ServerContext};
    pub use crate::credentials::PerCallCredentials;
    pub use crate::dispatch::{ServiceDispatch, StreamDescriptor, StreamHandler, UnaryHandler};
    pub use crate::error::{Code, Status};
    pub use crate::payload::Payload;
    pub use crate::server_stream::ServerStream;
}
