//! In-memory event bus for local development and tests.

use std::sync::mpsc;
use std::sync::Mutex;

use crate::bus::{EventBus, Subscription};

/// Errors from the in-memory bus.
#[derive(Debug, thiserror::Error)]
pub enum InMemoryBusError {
    /// The subscriber registry lock was poisoned by a panicking thread.
    #[error("subscriber registry lock poisoned")]
    Poisoned,
}

/// A simple broadcast bus backed by `std::sync::mpsc` channels.
///
/// Every subscriber gets its own channel; `publish` clones the message into
/// each live channel. Subscribers whose receiving end has been dropped are
/// pruned on the next publish.
#[derive(Debug, Default)]
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + Sync + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut subscribers = self
            .subscribers
            .lock()
            .map_err(|_| InMemoryBusError::Poisoned)?;

        // Drop senders whose receiver is gone.
        subscribers.retain(|sender| sender.send(message.clone()).is_ok());

        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();
        match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers.push(tx),
            Err(mut poisoned) => poisoned.get_mut().push(tx),
        }
        Subscription::new(rx)
    }
}
