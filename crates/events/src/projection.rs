use crate::{Event, EventEnvelope};

/// A projection builds a read model from an append-only event stream.
///
/// Read models are disposable, denormalized views of the event history. The
/// catalog browse page, the order dashboard, and the inbox are all
/// projections over the same streams.
///
/// Projections must be **idempotent**: the bus delivers at-least-once, and
/// rebuilds replay the full history. Duplicate handling (sequence cursors,
/// upserts) is the projection's responsibility; `ProjectionRunner` helps by
/// tracking sequence numbers.
///
/// Tenant isolation happens here too: updates are scoped to the envelope's
/// `tenant_id`.
pub trait Projection {
    type Ev: Event;

    /// Apply a single event, updating the read model.
    ///
    /// No error return: irrelevant events are ignored, and resilience beats
    /// halting the stream. For structured error handling use
    /// `ProjectionRunner::apply()`.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);
}
