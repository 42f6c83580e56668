//! Command execution pipeline.
//!
//! One consistent path for every aggregate command:
//!
//! ```text
//! load history -> rehydrate -> handle -> append (optimistic) -> publish
//! ```
//!
//! Tenant isolation and sequence monotonicity are re-checked on loaded
//! streams even though the store enforces them, so a buggy backend cannot
//! leak cross-tenant data into an aggregate.
//!
//! If publication fails after a successful append, the events are already
//! durable and the error surfaces as [`DispatchError::Publish`]; delivery is
//! at-least-once and consumers must be idempotent.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use motormart_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, TenantId};
use motormart_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug)]
pub enum DispatchError {
    /// Optimistic concurrency failure (e.g. stale aggregate version).
    Concurrency(String),
    /// Tenant isolation violation (cross-tenant or cross-aggregate stream mixing).
    TenantIsolation(String),
    /// Domain validation failure (deterministic).
    Validation(String),
    /// Domain invariant failure (deterministic).
    InvariantViolation(String),
    /// Domain authorization failure.
    Unauthorized,
    /// Domain-level not found.
    NotFound,
    /// Failed to deserialize historical event payloads into the aggregate event type.
    Deserialize(String),
    /// Persisting to the event store failed.
    Store(EventStoreError),
    /// Publication failed after a successful append (at-least-once; retry may duplicate).
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg.clone()),
            EventStoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg.clone()),
            _ => DispatchError::Store(value),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::Unauthorized => DispatchError::Unauthorized,
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Sits between the HTTP handlers and the store/bus pair. Generic over both
/// so tests run on the in-memory implementations and production can swap in
/// durable backends without touching domain code.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command through the full pipeline.
    ///
    /// `make_aggregate` produces a fresh instance (e.g. `Listing::empty(id)`)
    /// so the dispatcher stays generic over aggregate construction.
    ///
    /// Returns the committed events with assigned sequence numbers. A command
    /// that decides zero events (an idempotent no-op) returns an empty vector
    /// without touching the store.
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: motormart_events::Event + Serialize + DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        // verify_stream also proves the history is sequence-ordered, so
        // rehydration below can apply it as-is.
        let version = verify_stream(tenant_id, aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(version);

        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        for stored in history {
            let event: A::Event = serde_json::from_value(stored.payload)
                .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
            aggregate.apply(&event);
        }

        // Pure decision step; state is only read, never mutated here.
        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|event| {
                UncommittedEvent::from_typed(
                    tenant_id,
                    aggregate_id,
                    aggregate_type.clone(),
                    Uuid::now_v7(),
                    event,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        // Publish only after the append succeeded.
        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }
}

/// Check a loaded stream for tenant/aggregate mixing and sequence gaps in
/// one pass, returning the stream's current version (0 for a fresh stream).
fn verify_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<u64, DispatchError> {
    let mut version = 0u64;
    for (idx, stored) in stream.iter().enumerate() {
        if stored.tenant_id != tenant_id {
            return Err(DispatchError::TenantIsolation(format!(
                "stream for {aggregate_id} holds an event for another tenant at index {idx}"
            )));
        }
        if stored.aggregate_id != aggregate_id {
            return Err(DispatchError::TenantIsolation(format!(
                "stream for {aggregate_id} holds an event for another aggregate at index {idx}"
            )));
        }
        if stored.sequence_number <= version {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                format!(
                    "sequence numbers not strictly increasing at index {idx} \
                     ({} after {version})",
                    stored.sequence_number
                ),
            )));
        }
        version = stored.sequence_number;
    }
    Ok(version)
}
