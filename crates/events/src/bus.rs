//! Event publishing/subscription abstraction (mechanics only).
//!
//! A lightweight pub/sub contract for distributing events to consumers
//! (projections, workers, notification hooks). The bus is **transport**, not
//! storage: events live in the event store first, then get published here.
//!
//! Delivery is **at-least-once** and ordering is only what the implementation
//! provides, so consumers must be idempotent. That is acceptable because the
//! event store remains the source of truth and read models are disposable.

use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

/// A subscription to an event stream.
///
/// Each subscription gets a copy of every event published to the bus
/// (broadcast semantics). Subscriptions are designed for single-threaded
/// consumption; give each consumer thread its own subscription.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
///
/// Events are **stored first** (event store), then **published** (bus). If
/// publication fails, events are still in the store and can be republished,
/// which is where the at-least-once guarantee comes from.
///
/// `publish()` can fail (bus full, transport error); failures surface to the
/// caller, which may retry safely since the events are already persisted.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
