//! End-to-end scenarios driving a [`Channel`] the way a host application
//! would: through its public `unary`/`streaming` entry points only, never
//! reaching into `chanrpc_core`'s internals.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chanrpc_core::channel::Channel;
use chanrpc_core::context::{ClientContext, Peer, ServerContext};
use chanrpc_core::dispatch::{Handler, ServiceDispatch, StreamDescriptor, StreamHandler};
use chanrpc_core::server_stream::ServerStream;
use chanrpc_core::Status;

struct Registry(HashMap<&'static str, (StreamDescriptor, Handler)>);

impl ServiceDispatch for Registry {
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

fn dispatch_with(entries: Vec<(&'static str, StreamDescriptor, Handler)>) -> Arc<dyn ServiceDispatch> {
    let mut map = HashMap::new();
    for (method, descriptor, handler) in entries {
        map.insert(method, (descriptor, handler));
    }
    Arc::new(Registry(map))
}

/// Client-streaming: counts every request until the caller half-closes,
/// then sends the count as the single response.
struct CountRequests;

#[async_trait]
impl StreamHandler for CountRequests {
    async fn call(&self, _ctx: ServerContext, stream: ServerStream) -> Result<(), Status> {
        let mut count = 0u32;
        while stream.recv::<u32>().await?.is_some() {
            count += 1;
        }
        stream.send(count).await?;
        Ok(())
    }
}

#[tokio::test]
async fn client_streaming_counts_every_request_then_responds_once() {
    let dispatch = dispatch_with(vec![(
        "/chanrpc.Counter/CountRequests",
        StreamDescriptor::ClientStreaming,
        Handler::Stream(Arc::new(CountRequests)),
    )]);
    let channel = Channel::new(dispatch);
    let ctx = ClientContext::new(Peer::new("caller"));
    let call = channel
        .streaming("/chanrpc.Counter/CountRequests", ctx)
        .await
        .unwrap();

    for _ in 0..5u32 {
        call.send(1u32).await.unwrap();
    }
    call.close_requests(Status::ok()).await.unwrap();

    let count: u32 = call.recv().await.unwrap().unwrap();
    assert_eq!(count, 5);

    let eof: Option<u32> = call.recv().await.unwrap();
    assert_eq!(eof, None);
}

/// Bidirectional: echoes each request back, in order, as its own response.
struct BidiEcho;

#[async_trait]
impl StreamHandler for BidiEcho {
    async fn call(&self, _ctx: ServerContext, stream: ServerStream) -> Result<(), Status> {
        while let Some(request) = stream.recv::<u32>().await? {
            stream.send(request * 10).await?;
        }
        Ok(())
    }
}

#[tokio::test]
async fn bidi_echo_interleaves_sends_and_receives() {
    let dispatch = dispatch_with(vec![(
        "/chanrpc.Echo/Bidi",
        StreamDescriptor::Bidirectional,
        Handler::Stream(Arc::new(BidiEcho)),
    )]);
    let channel = Channel::new(dispatch);
    let ctx = ClientContext::new(Peer::new("caller"));
    let call = channel.streaming("/chanrpc.Echo/Bidi", ctx).await.unwrap();

    for value in [1u32, 2, 3] {
        call.send(value).await.unwrap();
        let echoed: u32 = call.recv().await.unwrap().unwrap();
        assert_eq!(echoed, value * 10);
    }

    call.close_requests(Status::ok()).await.unwrap();
    let eof: Option<u32> = call.recv().await.unwrap();
    assert_eq!(eof, None);
}
