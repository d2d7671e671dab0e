//! The single-threaded cooperative scheduler every call's state is mutated
//! through.
//!
//! All of a channel's in-flight calls live in one [`Registry`], owned
//! exclusively by one `tokio` task (spawned by [`spawn`]). Every mutation -
//! a send, a recv registration, a header being sent, a call finishing -
//! happens as a [`Task`] closure submitted to that task over one of two
//! `mpsc` queues, never by reaching into the registry from anywhere else.
//! That's what lets [`crate::half_stream::HalfStream`] get away with no
//! lock: by construction, only one closure ever runs against the registry
//! at a time, and the one currently running owns `&mut Registry` for its
//! whole body, re-entrant calls included.
//!
//! The two queues exist to give a call's own internal bookkeeping (closing
//! a half-stream once both directions are drained, waking a cancellation
//! watcher) priority over brand-new external work (a fresh call arriving).
//! The loop drains the internal queue to empty before taking a single task
//! off the external queue, and repeats. This mirrors a single-threaded
//! event loop with two priority classes rather than a thread pool: handler
//! and caller code that looks like it's "blocking" is never actually
//! parking an OS thread, it's a `tokio` task `.await`-ing a
//! [`tokio::sync::oneshot`] reply that this loop's task will eventually send
//! (see [`crate::client_stream`] and [`crate::server_stream`]).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::Status;
use crate::rpc_state::RpcState;

/// A unique identifier for one in-flight call within a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(u64);

/// The set of in-flight calls, keyed by [`CallId`].
///
/// Only reachable from inside a [`Task`] closure running on the loop task
/// spawned by [`spawn`] - there is no way to obtain a `&mut Registry` any
/// other way, which is the whole point.
#[derive(Default)]
pub struct Registry {
    calls: HashMap<CallId, RpcState>,
}

impl Registry {
    /// Register a new call's state.
    pub fn insert(&mut self, id: CallId, state: RpcState) {
        self.calls.insert(id, state);
    }

    /// Borrow a call's state, if it's still registered.
    pub fn get_mut(&mut self, id: CallId) -> Option<&mut RpcState> {
        self.calls.get_mut(&id)
    }

    /// Remove a call's state once it's fully torn down.
    pub fn remove(&mut self, id: CallId) -> Option<RpcState> {
        self.calls.remove(&id)
    }

    /// Number of calls currently registered. Exposed for tests and
    /// diagnostics, not part of the steady-state call path.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// `true` if no calls are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// A unit of work run against the registry, on the loop task, to completion,
/// before any other task runs.
pub type Task = Box<dyn FnOnce(&mut Registry) + Send + 'static>;

/// A handle used to submit work to a running loop and to allocate call ids.
///
/// Cheap to clone; every clone shares the same underlying queues and id
/// counter. The loop keeps running as long as at least one `LoopHandle` (or
/// a clone of one of its senders) is alive.
#[derive(Clone)]
pub struct LoopHandle {
    internal: mpsc::UnboundedSender<Task>,
    external: mpsc::UnboundedSender<Task>,
    next_id: Arc<AtomicU64>,
}

impl LoopHandle {
    /// Allocate a fresh, never-reused call id.
    #[must_use]
    pub fn next_call_id(&self) -> CallId {
        CallId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Submit a task that must run before any currently-queued external
    /// task - a call's own bookkeeping, not new call setup.
    ///
    /// # Errors
    ///
    /// Returns `Status::unavailable` if the loop has already terminated.
    pub fn submit_internal(&self, task: Task) -> Result<(), Status> {
        self.internal
            .send(task)
            .map_err(|_| Status::unavailable("event loop has terminated"))
    }

    /// Submit a task representing new external work (starting a call,
    /// an adapter's send/recv request).
    ///
    /// # Errors
    ///
    /// Returns `Status::unavailable` if the loop has already terminated.
    pub fn submit_external(&self, task: Task) -> Result<(), Status> {
        self.external
            .send(task)
            .map_err(|_| Status::unavailable("event loop has terminated"))
    }
}

/// Spawn the event loop on the current `tokio` runtime and return a handle
/// to it.
#[must_use]
pub fn spawn() -> LoopHandle {
    let (internal_tx, internal_rx) = mpsc::unbounded_channel();
    let (external_tx, external_rx) = mpsc::unbounded_channel();
    tokio::spawn(run(internal_rx, external_rx));
    LoopHandle {
        internal: internal_tx,
        external: external_tx,
        next_id: Arc::new(AtomicU64::new(0)),
    }
}

async fn run(mut internal_rx: mpsc::UnboundedReceiver<Task>, mut external_rx: mpsc::UnboundedReceiver<Task>) {
    let mut registry = Registry::default();
    loop {
        // Drain every internal task before ever looking at external work.
        while let Ok(task) = internal_rx.try_recv() {
            task(&mut registry);
        }
        tokio::select! {
            biased;
            task = internal_rx.recv() => match task {
                Some(task) => task(&mut registry),
                None if external_rx.is_closed() => break,
                None => continue,
            },
            task = external_rx.recv() => match task {
                Some(task) => task(&mut registry),
                None if internal_rx.is_closed() => break,
                None => continue,
            },
        }
    }
    tracing::debug!(remaining = registry.len(), "event loop terminated");
}
