//! The caller-facing blocking adapter.
//!
//! [`ClientStream`] gives a caller task a conventional `async fn send` /
//! `async fn recv` stream API, backed by the same [`crate::half_stream::HalfStream`]
//! the event loop mutates directly. Every operation here submits a
//! [`crate::r#loop::Task`] closure to the loop and `.await`s a
//! [`tokio::sync::oneshot`] reply - this is the "blocking adapter" described
//! in the module docs of [`crate::r#loop`]: the caller's own task suspends,
//! but nothing is ever parked on an OS thread, and the loop task itself
//! never awaits anything.

use std::sync::Arc;

use http::HeaderMap;
use tokio::sync::oneshot;

use crate::error::Status;
use crate::half_stream::RecvOutcome;
use crate::observability::StatsHandler;
use crate::payload::Payload;
use crate::r#loop::{CallId, LoopHandle};

/// The caller's handle to one in-flight call's request/response streams.
#[derive(Clone)]
pub struct ClientStream {
    loop_handle: LoopHandle,
    call_id: CallId,
    stats: Arc<dyn StatsHandler>,
    method: Arc<str>,
}

impl ClientStream {
    /// Build a client stream over an already-registered call.
    #[must_use]
    pub fn new(loop_handle: LoopHandle, call_id: CallId, stats: Arc<dyn StatsHandler>, method: Arc<str>) -> Self {
        Self {
            loop_handle,
            call_id,
            stats,
            method,
        }
    }

    /// Send one request message.
    ///
    /// # Errors
    ///
    /// Returns the error from [`crate::half_stream::HalfStream::send`] (the
    /// request stream is already closed) or `Status::unavailable` if the
    /// loop has terminated before the send could run.
    pub async fn send(&self, value: impl Send + 'static) -> Result<(), Status> {
        let id = self.call_id;
        let (tx, rx) = oneshot::channel();
        self.loop_handle.submit_internal(Box::new(move |registry| {
            let result = match registry.get_mut(id) {
                Some(state) => state.requests.send(Payload::new(value)),
                None => Err(Status::internal("call no longer registered")),
            };
            let _ = tx.send(result);
        }))?;
        let result = rx.await.map_err(|_| Status::unavailable("event loop dropped the reply"))?;
        if result.is_ok() {
            self.stats.on_request_sent(&self.method);
        }
        result
    }

    /// Close the request stream, signalling no more requests will be sent.
    ///
    /// # Errors
    ///
    /// Returns `Status::unavailable` if the loop has already terminated.
    pub async fn close_requests(&self, status: Status) -> Result<(), Status> {
        let id = self.call_id;
        let (tx, rx) = oneshot::channel();
        self.loop_handle.submit_internal(Box::new(move |registry| {
            if let Some(state) = registry.get_mut(id) {
                state.requests.close(status);
            }
            let _ = tx.send(());
        }))?;
        rx.await.map_err(|_| Status::unavailable("event loop dropped the reply"))
    }

    /// Receive the next response message.
    ///
    /// Returns `Ok(None)` once the response stream has closed with
    /// `Status::ok`; any other close status is returned as `Err`.
    ///
    /// # Errors
    ///
    /// Returns `Status::internal` on a response type mismatch, or
    /// `Status::unavailable` if the loop has terminated.
    pub async fn recv<T: 'static>(&self) -> Result<Option<T>, Status> {
        let id = self.call_id;
        let (tx, rx) = oneshot::channel();
        self.loop_handle.submit_internal(Box::new(move |registry| {
            let Some(state) = registry.get_mut(id) else {
                let _ = tx.send(RecvOutcome::Closed(Status::internal("call no longer registered")));
                return;
            };
            state.responses.recv(Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }));
        }))?;
        let outcome = rx.await.map_err(|_| Status::unavailable("event loop dropped the reply"))?;
        if let RecvOutcome::Item(_) = &outcome {
            self.stats.on_response_received(&self.method);
        }
        crate::rpc_state::recv_outcome_into_result(outcome, Payload::into_typed)
    }

    /// Wait for the server to send headers (or for the call to finish
    /// without ever sending any).
    ///
    /// # Errors
    ///
    /// Returns `Status::unavailable` if the loop has already terminated.
    pub async fn wait_for_header(&self) -> Result<HeaderMap, Status> {
        let id = self.call_id;
        let (tx, rx) = oneshot::channel();
        self.loop_handle.submit_internal(Box::new(move |registry| {
            let Some(state) = registry.get_mut(id) else {
                let _ = tx.send(HeaderMap::new());
                return;
            };
            state.wait_for_header(Box::new(move |headers| {
                let _ = tx.send(headers);
            }));
        }))?;
        let headers = rx.await.map_err(|_| Status::unavailable("event loop dropped the reply"))?;
        self.stats.on_header_received(&self.method);
        Ok(headers)
    }

    /// Read the trailers once the call has finished. Returns an empty map if
    /// the call is still in flight.
    ///
    /// # Errors
    ///
    /// Returns `Status::unavailable` if the loop has already terminated.
    pub async fn trailers(&self) -> Result<HeaderMap, Status> {
        let id = self.call_id;
        let (tx, rx) = oneshot::channel();
        self.loop_handle.submit_internal(Box::new(move |registry| {
            let trailers = registry.get_mut(id).map(|s| s.trailers().clone()).unwrap_or_default();
            let _ = tx.send(trailers);
        }))?;
        rx.await.map_err(|_| Status::unavailable("event loop dropped the reply"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::TracingStatsHandler;
    use crate::r#loop::spawn;
    use crate::rpc_state::RpcState;

    fn test_stream(handle: LoopHandle, id: CallId) -> ClientStream {
        ClientStream::new(handle, id, Arc::new(TracingStatsHandler), Arc::from("/test/Method"))
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
    async fn send_then_recv_round_trips_a_typed_value() {
        let handle = spawn();
        let id = register_call(&handle).await;
        let stream = test_stream(handle.clone(), id);

        let (tx, rx) = oneshot::channel();
        handle
            .submit_external(Box::new(move |registry| {
                let state = registry.get_mut(id).unwrap();
                state.responses.send(Payload::new(7u32)).unwrap();
                let _ = tx.send(());
            }))
            .unwrap();
        rx.await.unwrap();

        let value: Option<u32> = stream.recv().await.unwrap();
        assert_eq!(value, Some(7));
    }

    #[tokio::test]
    async fn recv_after_graceful_close_returns_none() {
        let handle = spawn();
        let id = register_call(&handle).await;
        let stream = test_stream(handle.clone(), id);

        let (tx, rx) = oneshot::channel();
        handle
            .submit_external(Box::new(move |registry| {
                registry.get_mut(id).unwrap().responses.close(Status::ok());
                let _ = tx.send(());
            }))
            .unwrap();
        rx.await.unwrap();

        let value: Option<u32> = stream.recv().await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn wait_for_header_resolves_once_sent() {
        let handle = spawn();
        let id = register_call(&handle).await;
        let stream = test_stream(handle.clone(), id);

        let (tx, rx) = oneshot::channel();
        handle
            .submit_external(Box::new(move |registry| {
                let mut headers = HeaderMap::new();
                headers.insert("x-trace", "abc".parse().unwrap());
                registry.get_mut(id).unwrap().send_header(headers).unwrap();
                let _ = tx.send(());
            }))
            .unwrap();
        rx.await.unwrap();

        let headers = stream.wait_for_header().await.unwrap();
        assert_eq!(headers.get("x-trace").unwrap(), "abc");
    }
}
