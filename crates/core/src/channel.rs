//! The call orchestrator: per-call construction, cancellation, and teardown.
//!
//! A [`Channel`] ties everything else in this crate together. It owns the
//! event loop (see [`crate::r#loop`]), a [`crate::dispatch::ServiceDispatch`]
//! to resolve method names against, and optional per-call credentials and
//! observability hooks. Its two entry points, [`Channel::unary`] and
//! [`Channel::streaming`], are where a caller's method invocation becomes a
//! registered [`crate::rpc_state::RpcState`], a running handler task, and a
//! cancellation watcher racing that handler to the call's terminal status.

use std::sync::Arc;

use crate::context::{ClientContext, ServerContext};
use crate::credentials::{self, PerCallCredentials};
use crate::dispatch::{Handler, ServiceDispatch};
use crate::client_stream::ClientStream;
use crate::error::Status;
use crate::r#loop::{self, LoopHandle};
use crate::method_name::MethodName;
use crate::observability::{StatsHandler, TracingStatsHandler};
use crate::payload::Payload;
use crate::rpc_state::RpcState;
use crate::server_stream::ServerStream;

/// An in-process RPC channel: handlers registered through `dispatch` are
/// reachable from [`Channel::unary`] and [`Channel::streaming`] with no
/// wire format or transport in between.
#[derive(Clone)]
pub struct Channel {
    loop_handle: LoopHandle,
    dispatch: Arc<dyn ServiceDispatch>,
    credentials: Option<Arc<dyn PerCallCredentials>>,
    stats: Arc<dyn StatsHandler>,
}

impl Channel {
    /// Build a channel over the given method dispatch, spawning its own
    /// event loop.
    #[must_use]
    pub fn new(dispatch: Arc<dyn ServiceDispatch>) -> Self {
        Self {
            loop_handle: r#loop::spawn(),
            dispatch,
            credentials: None,
            stats: Arc::new(TracingStatsHandler),
        }
    }

    /// Attach per-call credentials, applied to every call's outgoing
    /// metadata before dispatch.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Arc<dyn PerCallCredentials>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Attach a [`StatsHandler`], replacing the default [`TracingStatsHandler`].
    #[must_use]
    pub fn with_stats_handler(mut self, stats: Arc<dyn StatsHandler>) -> Self {
        self.stats = stats;
        self
    }

    async fn prepare_call(
        &self,
        method: &str,
        ctx: &mut ClientContext,
    ) -> Result<(MethodName, Handler), Status> {
        let method_name = MethodName::parse(method)?;
        let resolved = self
            .dispatch
            .resolve(method_name.as_str())
            .ok_or_else(|| Status::unimplemented(format!("no handler registered for {method_name}")))?;
        if let Some(credentials) = &self.credentials {
            credentials::attach(credentials.as_ref(), method_name.as_str(), ctx.metadata_mut()).await?;
        }
        Ok((method_name, resolved.1))
    }

    fn register_call(&self) -> Result<crate::r#loop::CallId, Status> {
        let call_id = self.loop_handle.next_call_id();
        self.loop_handle
            .submit_external(Box::new(move |registry| registry.insert(call_id, RpcState::new())))?;
        Ok(call_id)
    }

    /// Invoke a unary method: send exactly one request, run the handler
    /// inline (racing it against the caller's cancellation token), and
    /// return exactly one response.
    ///
    /// # Errors
    ///
    /// Returns `Status::unimplemented` if no handler is registered,
    /// `Status::invalid_argument` if the resolved handler is a
    /// [`crate::dispatch::StreamHandler`] rather than a
    /// [`crate::dispatch::UnaryHandler`], `Status::cancelled` if the
    /// caller's context is cancelled before the handler finishes, or
    /// whatever status the handler itself returns.
    pub async fn unary<Req, Resp>(&self, method: &str, mut ctx: ClientContext, request: Req) -> Result<Resp, Status>
    where
        Req: Send + 'static,
        Resp: 'static,
    {
        let (method_name, resolved) = self.prepare_call(method, &mut ctx).await?;
        let Handler::Unary(handler) = resolved else {
            return Err(Status::invalid_argument(format!(
                "{method_name} is a streaming method; call it via Channel::streaming"
            )));
        };

        let call_id = self.register_call()?;
        self.stats.on_call_start(method_name.as_str(), ctx.peer());
        let method_label: Arc<str> = Arc::from(method_name.as_str());

        let client_stream = ClientStream::new(
            self.loop_handle.clone(),
            call_id,
            Arc::clone(&self.stats),
            Arc::clone(&method_label),
        );
        client_stream.send(request).await?;
        client_stream.close_requests(Status::ok()).await?;

        let server_stream = ServerStream::new(
            self.loop_handle.clone(),
            call_id,
            Arc::clone(&self.stats),
            Arc::clone(&method_label),
        );
        let server_ctx = ServerContext::from_client(ctx.clone());
        let cancel_token = ctx.cancellation_token();

        let result = tokio::select! {
            biased;
            () = cancel_token.cancelled() => Err(Status::cancelled("caller cancelled the call")),
            result = run_unary::<Req>(&server_stream, &*handler, server_ctx) => result,
        };

        let status = result.as_ref().err().cloned().unwrap_or_else(Status::ok);
        self.finish_call(call_id, status.clone());
        self.stats.on_call_end(method_name.as_str(), &status);

        result?.into_typed()
    }

    /// Invoke a streaming method: spawn the handler on its own task and
    /// return a [`ClientStream`] the caller drives independently. The
    /// spawned task races the handler to completion against the caller's
    /// cancellation token, finishing the call either way.
    ///
    /// # Errors
    ///
    /// Returns `Status::unimplemented` if no handler is registered, or
    /// `Status::invalid_argument` if the resolved handler is a
    /// [`crate::dispatch::UnaryHandler`] rather than a
    /// [`crate::dispatch::StreamHandler`].
    pub async fn streaming(&self, method: &str, mut ctx: ClientContext) -> Result<ClientStream, Status> {
        let (method_name, resolved) = self.prepare_call(method, &mut ctx).await?;
        let Handler::Stream(handler) = resolved else {
            return Err(Status::invalid_argument(format!(
                "{method_name} is a unary method; call it via Channel::unary"
            )));
        };

        let call_id = self.register_call()?;
        self.stats.on_call_start(method_name.as_str(), ctx.peer());
        let method_label: Arc<str> = Arc::from(method_name.as_str());

        let server_ctx = ServerContext::from_client(ctx.clone());
        let server_stream = ServerStream::new(
            self.loop_handle.clone(),
            call_id,
            Arc::clone(&self.stats),
            Arc::clone(&method_label),
        );
        let cancel_token = ctx.cancellation_token();
        let loop_handle = self.loop_handle.clone();
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                () = cancel_token.cancelled() => Err(Status::cancelled("caller cancelled the call")),
                result = handler.call(server_ctx, server_stream) => result,
            };
            let status = result.err().unwrap_or_else(Status::ok);
            let status_for_stats = status.clone();
            let _ = loop_handle.submit_internal(Box::new(move |registry| {
                if let Some(state) = registry.get_mut(call_id) {
                    state.finish(status);
                }
            }));
            stats.on_call_end(method_name.as_str(), &status_for_stats);
        });

        Ok(ClientStream::new(
            self.loop_handle.clone(),
            call_id,
            Arc::clone(&self.stats),
            method_label,
        ))
    }

    fn finish_call(&self, call_id: crate::r#loop::CallId, status: Status) {
        let _ = self.loop_handle.submit_internal(Box::new(move |registry| {
            if let Some(state) = registry.get_mut(call_id) {
                state.finish(status);
            }
        }));
    }
}

async fn run_unary<Req: Send + 'static>(
    server_stream: &ServerStream,
    handler: &(dyn crate::dispatch::UnaryHandler),
    server_ctx: ServerContext,
) -> Result<Payload, Status> {
    let request: Req = server_stream
        .recv()
        .await?
        .ok_or_else(|| Status::internal("unary call's request stream closed with no request"))?;
    handler.call(server_ctx, Payload::new(request)).await
}
