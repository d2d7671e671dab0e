//! Call-lifecycle instrumentation hooks.
//!
//! A [`StatsHandler`] observes a call without participating in it: every
//! method has a no-op default, so a host application can implement only the
//! handful of hooks it cares about (latency at call-end, message counts,
//! whatever) without stubbing out the rest. Hooks are invoked from inside
//! the event loop task, so implementations must be quick and must not block
//! - anything expensive should hand off to its own task.

use crate::context::Peer;
use crate::error::Status;

/// Lifecycle hooks for a single call, observed from both the client and the
/// server side of a [`crate::channel::Channel`] invocation.
pub trait StatsHandler: Send + Sync + 'static {
    /// A call was started, naming the method and the peer it targets.
    fn on_call_start(&self, method: &str, peer: &Peer) {
        let _ = (method, peer);
    }

    /// The call reached a terminal state.
    fn on_call_end(&self, method: &str, status: &Status) {
        let _ = (method, status);
    }

    /// The server sent headers.
    fn on_header_sent(&self, method: &str) {
        let _ = method;
    }

    /// The client observed headers arrive.
    fn on_header_received(&self, method: &str) {
        let _ = method;
    }

    /// A request message was sent by the client.
    fn on_request_sent(&self, method: &str) {
        let _ = method;
    }

    /// A request message was received by the server.
    fn on_request_received(&self, method: &str) {
        let _ = method;
    }

    /// A response message was sent by the server.
    fn on_response_sent(&self, method: &str) {
        let _ = method;
    }

    /// A response message was received by the client.
    fn on_response_received(&self, method: &str) {
        let _ = method;
    }

    /// The server sent trailers.
    fn on_trailer_sent(&self, method: &str) {
        let _ = method;
    }
}

/// A [`StatsHandler`] that logs every hook at `trace` level via `tracing`,
/// and otherwise does nothing. Useful for debugging a channel's call
/// lifecycle without writing a bespoke handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatsHandler;

impl StatsHandler for TracingStatsHandler {
    fn on_call_start(&self, method: &str, peer: &Peer) {
        tracing::trace!(method, peer = peer.label(), "call start");
    }

    fn on_call_end(&self, method: &str, status: &Status) {
        tracing::trace!(method, %status, "call end");
    }

    fn on_header_sent(&self, method: &str) {
        tracing::trace!(method, "header sent");
    }

    fn on_header_received(&self, method: &str) {
        tracing::trace!(method, "header received");
    }

    fn on_request_sent(&self, method: &str) {
        tracing::trace!(method, "request sent");
    }

    fn on_request_received(&self, method: &str) {
        tracing::trace!(method, "request received");
    }

    fn on_response_sent(&self, method: &str) {
        tracing::trace!(method, "response sent");
    }

    fn on_response_received(&self, method: &str) {
        tracing::trace!(method, "response received");
    }

    fn on_trailer_sent(&self, method: &str) {
        tracing::trace!(method, "trailer sent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHandler {
        ends: AtomicUsize,
    }

    impl StatsHandler for CountingHandler {
        fn on_call_end(&self, _method: &str, _status: &Status) {
            self.ends.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn unimplemented_hooks_are_harmless_no_ops() {
        let handler = CountingHandler::default();
        handler.on_call_start("/svc/Method", &Peer::new("caller"));
        handler.on_header_sent("/svc/Method");
        handler.on_request_sent("/svc/Method");
        assert_eq!(handler.ends.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn implemented_hook_fires() {
        let handler = CountingHandler::default();
        handler.on_call_end("/svc/Method", &Status::ok());
        assert_eq!(handler.ends.load(Ordering::SeqCst), 1);
    }
}
