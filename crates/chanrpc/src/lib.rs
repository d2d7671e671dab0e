//! chanrpc is an in-process RPC channel: it makes gRPC-style call semantics
//! available as direct function calls within a single process, with no
//! network, serialization, or transport layer in between. Read more:
//! <https://docs.rs/chanrpc/>

#![deny(unreachable_pub)]
#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::future_not_send)]

pub use chanrpc_core as core;
#[doc(no_inline)]
pub use chanrpc_core::*;

/// A list of things most applications using chanrpc will want in scope.
pub mod prelude {
    pub use chanrpc_core::prelude::*;
}
