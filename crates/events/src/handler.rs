use crate::{Command, Event};

/// Handles a command and emits events, outside the aggregate lifecycle.
///
/// A simpler interface than `Aggregate::handle` for background workers and
/// test doubles. Errors are domain-specific, so the error type is associated.
pub trait CommandHandler {
    type Cmd: Command;
    type Ev: Event;
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn handle(&self, command: Self::Cmd) -> Result<Vec<Self::Ev>, Self::Error>;
}

/// Execute an aggregate command deterministically (no IO, no async).
///
/// Decide then evolve: `handle` produces events without mutating, then each
/// event is applied in order. The aggregate maintains its own version during
/// `apply`. For persistence, publication, and optimistic concurrency use
/// `CommandDispatcher::dispatch()` instead.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: motormart_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
