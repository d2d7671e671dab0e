//! A single direction of a bidirectional stream.
//!
//! A [`HalfStream`] is a FIFO queue of [`Payload`] values plus, at most, one
//! pending receive: a callback waiting for the next item (or for the stream
//! to close) because the queue was empty when it asked. It has no thread of
//! its own and no lock - every method takes `&mut self` and is only ever
//! called from the single task that owns the enclosing
//! [`crate::rpc_state::RpcState`] (see [`crate::r#loop`]), so "send" and
//! "recv" racing each other is structurally impossible rather than merely
//! guarded against.
//!
//! The one subtlety worth calling out: when [`HalfStream::send`] finds a
//! pending receiver waiting, it must clear that slot *before* invoking the
//! receiver's callback. The callback is allowed to turn around and call back
//! into this same `HalfStream` (a handler that sends then immediately reads
//! its own backlog, for instance), and if the slot were still occupied that
//! re-entrant call would see a stale waiter instead of an empty slot.

use std::collections::VecDeque;

use crate::error::{Code, Status};
use crate::payload::Payload;

/// The outcome delivered to a receiver: either the next item, or a
/// terminal status once the stream has closed and the queue has drained.
#[derive(Debug)]
pub enum RecvOutcome {
    /// An item was available (from the backlog or delivered directly).
    Item(Payload),
    /// The stream is closed and no more items will ever arrive.
    Closed(Status),
}

/// A callback invoked exactly once with a [`RecvOutcome`].
pub type RecvWaiter = Box<dyn FnOnce(RecvOutcome) + Send>;

/// One direction (requests or responses) of an in-flight call.
#[derive(Default)]
pub struct HalfStream {
    backlog: VecDeque<Payload>,
    waiter: Option<RecvWaiter>,
    close_status: Option<Status>,
}

impl HalfStream {
    /// An empty, open half-stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` once [`HalfStream::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.close_status.is_some()
    }

    /// Number of items currently backlogged (not yet delivered to a waiter).
    #[must_use]
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Enqueue a value, or deliver it straight to a pending receiver.
    ///
    /// # Errors
    ///
    /// Returns `Status::failed_precondition`-flavored internal status if the
    /// stream is already closed; a closed half-stream accepts no further
    /// sends.
    pub fn send(&mut self, value: Payload) -> Result<(), Status> {
        if let Some(status) = &self.close_status {
            return Err(Status::new(
                Code::Internal,
                format!("send on a closed half-stream (closed with: {status})"),
            ));
        }
        if let Some(waiter) = self.waiter.take() {
            // Slot cleared above, before the callback runs: a re-entrant
            // send/recv from inside `waiter` sees an empty slot, not this one.
            waiter(RecvOutcome::Item(value));
        } else {
            self.backlog.push_back(value);
        }
        Ok(())
    }

    /// Request the next item.
    ///
    /// If the backlog is non-empty, or the stream is already closed, the
    /// callback runs synchronously before this call returns. Otherwise it is
    /// stashed as the pending waiter and runs later, from inside [`HalfStream::send`]
    /// or [`HalfStream::close`].
    ///
    /// # Panics
    ///
    /// Panics if a receive is already pending - at most one outstanding
    /// receive per half-stream is an invariant the adapters above this type
    /// are responsible for upholding, since a second concurrent receive is a
    /// handler/caller programming error, not a runtime condition.
    pub fn recv(&mut self, waiter: RecvWaiter) {
        assert!(self.waiter.is_none(), "recv called with one already pending");
        if let Some(value) = self.backlog.pop_front() {
            waiter(RecvOutcome::Item(value));
            return;
        }
        if let Some(status) = &self.close_status {
            waiter(RecvOutcome::Closed(status.clone()));
            return;
        }
        self.waiter = Some(waiter);
    }

    /// Close the stream with a terminal status.
    ///
    /// Idempotent: closing an already-closed half-stream is a no-op (the
    /// first status wins). If a receive is pending and the backlog is
    /// empty, the waiter is woken with [`RecvOutcome::Closed`].
    pub fn close(&mut self, status: Status) {
        if self.close_status.is_some() {
            return;
        }
        self.close_status = Some(status.clone());
        if self.backlog.is_empty()
            && let Some(waiter) = self.waiter.take()
        {
            waiter(RecvOutcome::Closed(status));
        }
    }

    /// The status the stream was closed with, if any.
    #[must_use]
    pub fn close_status(&self) -> Option<&Status> {
        self.close_status.as_ref()
    }
}
