//! Append-only event store boundary.
//!
//! Storage-agnostic abstraction for tenant-scoped event streams. The
//! in-memory implementation backs tests and development; a SQL backend can
//! implement the same trait without touching domain code.

pub mod in_memory;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use query::{EventFilter, EventQuery, EventQueryResult, Pagination};
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// Adapter that publishes committed events to an `EventBus` after a
/// successful append.
///
/// Ordering invariant: publish happens only after append succeeds.
pub struct PublishingEventStore<S, B> {
    store: S,
    bus: B,
}

impl<S, B> PublishingEventStore<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> EventStore for PublishingEventStore<S, B>
where
    S: EventStore,
    B: motormart_events::EventBus<motormart_events::EventEnvelope<serde_json::Value>>,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: motormart_core::ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let committed = self.store.append(events, expected_version)?;

        // Best-effort publication; at-least-once is acceptable downstream.
        for e in &committed {
            self.bus
                .publish(e.to_envelope())
                .map_err(|err| EventStoreError::Publish(format!("{err:?}")))?;
        }

        Ok(committed)
    }

    fn load_stream(
        &self,
        tenant_id: motormart_core::TenantId,
        aggregate_id: motormart_core::AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.store.load_stream(tenant_id, aggregate_id)
    }
}
