//! The narrow contract a host application implements to register handlers.
//!
//! This is deliberately thin: one trait per handler shape, one trait to
//! look a method name up and get a handler back. Routing between multiple
//! services, interceptor/middleware chains, reflection - all of that is
//! host-application business and lives above this crate, the same way a
//! wire format and a transport do.

use async_trait::async_trait;

use crate::context::ServerContext;
use crate::error::Status;
use crate::payload::Payload;
use crate::server_stream::ServerStream;

/// A handler for a unary (single request, single response) method.
#[async_trait]
pub trait UnaryHandler: Send + Sync + 'static {
    /// Handle one call, producing a single response or failing the call.
    async fn call(&self, ctx: ServerContext, request: Payload) -> Result<Payload, Status>;
}

/// A handler for a method with at least one streaming direction.
///
/// Unlike [`UnaryHandler`], a stream handler drives its own request/response
/// traffic through `stream` rather than being handed a single request and
/// returning a single response; it decides when the call is done by
/// returning (a non-error return finishes the call with `Status::ok`, see
/// [`crate::rpc_state::RpcState::finish`]).
#[async_trait]
pub trait StreamHandler: Send + Sync + 'static {
    /// Drive a streaming call to completion.
    async fn call(&self, ctx: ServerContext, stream: ServerStream) -> Result<(), Status>;
}

/// Which directions of a method stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamDescriptor {
    /// Exactly one request, exactly one response.
    Unary,
    /// One request, a stream of responses.
    ServerStreaming,
    /// A stream of requests, one response.
    ClientStreaming,
    /// A stream of requests and a stream of responses, independently paced.
    Bidirectional,
}

impl StreamDescriptor {
    /// `true` for [`StreamDescriptor::Unary`], the only shape dispatched
    /// through [`UnaryHandler`] rather than [`StreamHandler`].
    #[must_use]
    pub fn is_unary(self) -> bool {
        matches!(self, Self::Unary)
    }
}

/// A registered handler, resolved by [`ServiceDispatch::resolve`].
pub enum Handler {
    /// Dispatch through [`UnaryHandler::call`].
    Unary(std::sync::Arc<dyn UnaryHandler>),
    /// Dispatch through [`StreamHandler::call`].
    Stream(std::sync::Arc<dyn StreamHandler>),
}

/// Looks a method name up and returns the handler registered for it, if any.
///
/// This is the only extension point a host application needs to implement
/// to back a [`crate::channel::Channel`] with its own handlers; everything
/// else (header/trailer plumbing, cancellation, per-call credentials) is
/// handled by the channel around whatever `resolve` returns.
pub trait ServiceDispatch: Send + Sync + 'static {
    /// Resolve a method name to its handler and stream shape.
    ///
    /// Returns `None` for methods with no registered handler; the channel
    /// maps that to [`crate::error::Code::Unimplemented`].
    fn resolve(&self, method: &str) -> Option<(StreamDescriptor, Handler)>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct Echo;

    #[async_trait]
    impl UnaryHandler for Echo {
        async fn call(&self, _ctx: ServerContext, request: Payload) -> Result<Payload, Status> {
            Ok(request)
        }
    }

    struct StaticRegistry(HashMap<&'static str, (StreamDescriptor, Handler)>);

    impl ServiceDispatch for StaticRegistry {
        fn resolve(&self, method: &str) -> Option<(StreamDescriptor, Handler)> {
            self.0.get(method).map(|(descriptor, handler)| {
                let handler = match handler {
                    Handler::Unary(h) => Handler::Unary(Arc::clone(h)),
                    Handler::Stream(h) => Handler::Stream(Arc::clone(h)),
                };
                (*descriptor, handler)
            })
        }
    }

    #[test]
    fn resolve_returns_none_for_unregistered_methods() {
        let registry = StaticRegistry(HashMap::new());
        assert!(registry.resolve("/svc/Missing").is_none());
    }

    #[test]
    fn resolve_returns_the_registered_shape() {
        let mut methods = HashMap::new();
        methods.insert(
            "/svc/Echo",
            (StreamDescriptor::Unary, Handler::Unary(Arc::new(Echo))),
        );
        let registry = StaticRegistry(methods);
        let (descriptor, _handler) = registry.resolve("/svc/Echo").unwrap();
        assert!(descriptor.is_unary());
    }
}
