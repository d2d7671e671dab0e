//! The handler-facing blocking adapter.
//!
//! [`ServerStream`] is [`crate::client_stream::ClientStream`]'s mirror image:
//! a conventional `async fn send` / `async fn recv` stream API for a
//! [`crate::dispatch::StreamHandler`] running on an ordinary `tokio` task,
//! backed by the same loop-task-owned [`crate::rpc_state::RpcState`]. A
//! handler reads from `requests` and writes to `responses`; a caller (via
//! [`crate::client_stream::ClientStream`]) does the opposite.

use std::sync::Arc;

use http::HeaderMap;
use tokio::sync::oneshot;

use crate::error::Status;
use crate::half_stream::RecvOutcome;
use crate::observability::StatsHandler;
use crate::payload::Payload;
use crate::r#loop::{CallId, LoopHandle};

/// The handler's side of one in-flight call's request/response streams.
pub struct ServerStream {
    loop_handle: LoopHandle,
    call_id: CallId,
    stats: Arc<dyn StatsHandler>,
    method: Arc<str>,
}

impl ServerStream {
    /// Build a server stream over an already-registered call.
    #[must_use]
    pub fn new(loop_handle: LoopHandle, call_id: CallId, stats: Arc<dyn StatsHandler>, method: Arc<str>) -> Self {
        Self {
            loop_handle,
            call_id,
            stats,
            method,
        }
    }

    /// Receive the next request message.
    ///
    /// Returns `Ok(None)` once the request stream has closed with
    /// `Status::ok` (the client is done sending); any other close status is
    /// returned as `Err`.
    ///
    /// # Errors
    ///
    /// Returns `Status::internal` on a request type mismatch, or
    /// `Status::unavailable` if the loop has terminated.
    pub async fn recv<T: 'static>(&self) -> Result<Option<T>, Status> {
        let id = self.call_id;
        let (tx, rx) = oneshot::channel();
        self.loop_handle.submit_internal(Box::new(move |registry| {
            let Some(state) = registry.get_mut(id) else {
                let _ = tx.send(RecvOutcome::Closed(Status::internal("call no longer registered")));
                return;
            };
            state.requests.recv(Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }));
        }))?;
        let outcome = rx.await.map_err(|_| Status::unavailable("event loop dropped the reply"))?;
        if let RecvOutcome::Item(_) = &outcome {
            self.stats.on_request_received(&self.method);
        }
        crate::rpc_state::recv_outcome_into_result(outcome, Payload::into_typed)
    }

    /// Send one response message.
    ///
    /// Headers must precede response data. If this is the first send and the
    /// handler never called [`ServerStream::send_header`] explicitly, empty
    /// headers are sent implicitly before the response is appended.
    ///
    /// # Errors
    ///
    /// Returns the error from [`crate::half_stream::HalfStream::send`] (the
    /// response stream is already closed) or `Status::unavailable` if the
    /// loop has terminated before the send could run.
    pub async fn send(&self, value: impl Send + 'static) -> Result<(), Status> {
        let id = self.call_id;
        let (tx, rx) = oneshot::channel();
        self.loop_handle.submit_internal(Box::new(move |registry| {
            let Some(state) = registry.get_mut(id) else {
                let _ = tx.send((Err(Status::internal("call no longer registered")), false));
                return;
            };
            let header_sent_implicitly = if state.header_sent() {
                false
            } else {
                let _ = state.send_header(HeaderMap::new());
                true
            };
            let result = state.responses.send(Payload::new(value));
            let _ = tx.send((result, header_sent_implicitly));
        }))?;
        let (result, header_sent_implicitly) =
            rx.await.map_err(|_| Status::unavailable("event loop dropped the reply"))?;
        if header_sent_implicitly {
            self.stats.on_header_sent(&self.method);
        }
        if result.is_ok() {
            self.stats.on_response_sent(&self.method);
        }
        result
    }

    /// Send headers for this call. Must be called at most once.
    ///
    /// # Errors
    ///
    /// Returns the error from [`crate::rpc_state::RpcState::send_header`] if
    /// already called, or `Status::unavailable` if the loop has terminated.
    pub async fn send_header(&self, headers: HeaderMap) -> Result<(), Status> {
        let id = self.call_id;
        let (tx, rx) = oneshot::channel();
        self.loop_handle.submit_internal(Box::new(move |registry| {
            let result = match registry.get_mut(id) {
                Some(state) => state.send_header(headers),
                None => Err(Status::internal("call no longer registered")),
            };
            let _ = tx.send(result);
        }))?;
        let result = rx.await.map_err(|_| Status::unavailable("event loop dropped the reply"))?;
        if result.is_ok() {
            self.stats.on_header_sent(&self.method);
        }
        result
    }

    /// Merge additional trailer metadata, visible to the caller once the
    /// call finishes.
    ///
    /// # Errors
    ///
    /// Returns `Status::unavailable` if the loop has already terminated.
    pub async fn set_trailer(&self, trailer: HeaderMap) -> Result<(), Status> {
        let id = self.call_id;
        let (tx, rx) = oneshot::channel();
        self.loop_handle.submit_internal(Box::new(move |registry| {
            if let Some(state) = registry.get_mut(id) {
                state.set_trailer(trailer);
            }
            let _ = tx.send(());
        }))?;
        rx.await.map_err(|_| Status::unavailable("event loop dropped the reply"))?;
        self.stats.on_trailer_sent(&self.method);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::TracingStatsHandler;
    use crate::r#loop::spawn;
    use crate::rpc_state::RpcState;

    fn test_stream(handle: LoopHandle, id: CallId) -> ServerStream {
        ServerStream::new(handle, id, Arc::new(TracingStatsHandler), Arc::from("/test/Method"))
    }

    async fn register_call(handle: &LoopHandle) -> CallId {
        let id = handle.next_call_id();
        let (tx, rx) = oneshot::channel();
        handle
            .submit_external(Box::new(move |registry| {
                registry.insert(id, RpcState::new());
                let _ = tx.send(());
            }))
            .unwrap();
        rx.await.unwrap();
        id
    }

    #[tokio::test]
    async fn recv_request_then_send_response() {
        let handle = spawn();
        let id = register_call(&handle).await;
        let server = test_stream(handle.clone(), id);

        let (tx, rx) = oneshot::channel();
        handle
            .submit_external(Box::new(move |registry| {
                registry.get_mut(id).unwrap().requests.send(Payload::new(5u32)).unwrap();
                let _ = tx.send(());
            }))
            .unwrap();
        rx.await.unwrap();

        let request: Option<u32> = server.recv().await.unwrap();
        assert_eq!(request, Some(5));

        server.send(request.unwrap() * 2).await.unwrap();

        let (tx, rx) = oneshot::channel();
        handle
            .submit_external(Box::new(move |registry| {
                let state = registry.get_mut(id).unwrap();
                state.responses.recv(Box::new(move |outcome| {
                    let _ = tx.send(outcome);
                }));
            }))
            .unwrap();
        match rx.await.unwrap() {
            RecvOutcome::Item(payload) => assert_eq!(payload.downcast::<u32>().unwrap(), 10),
            RecvOutcome::Closed(_) => panic!("expected item"),
        }
    }

    #[tokio::test]
    async fn send_header_twice_reports_the_protocol_violation() {
        let handle = spawn();
        let id = register_call(&handle).await;
        let server = test_stream(handle.clone(), id);

        server.send_header(HeaderMap::new()).await.unwrap();
        let err = server.send_header(HeaderMap::new()).await.unwrap_err();
        assert_eq!(err.code(), crate::error::Code::Internal);
    }

    #[tokio::test]
    async fn send_implicitly_sends_headers_on_first_response() {
        let handle = spawn();
        let id = register_call(&handle).await;
        let server = test_stream(handle.clone(), id);

        server.send(1u32).await.unwrap();

        let (tx, rx) = oneshot::channel();
        handle
            .submit_external(Box::new(move |registry| {
                let _ = tx.send(registry.get_mut(id).unwrap().header_sent());
            }))
            .unwrap();
        assert!(rx.await.unwrap());

        // A handler that still calls send_header explicitly after its first
        // send hits the same double-send protection as two explicit calls.
        let err = server.send_header(HeaderMap::new()).await.unwrap_err();
        assert_eq!(err.code(), crate::error::Code::Internal);
    }
}
