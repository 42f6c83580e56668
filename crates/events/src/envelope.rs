use serde::{Deserialize, Serialize};
use uuid::Uuid;

use motormart_core::{AggregateId, TenantId};

/// Stored/published form of a single domain event.
///
/// The envelope carries everything the infrastructure needs without looking
/// inside the payload: which tenant owns the stream, which aggregate emitted
/// it, and where it sits in that aggregate's sequence. `aggregate_type` is a
/// dotted string like `"listings.listing"` so projections can route on it
/// without deserializing.
///
/// `sequence_number` starts at 1 and increases by exactly one per event in a
/// stream; consumers rely on that for idempotent replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    aggregate_type: String,
    sequence_number: u64,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    /// Position in the aggregate's stream (1-based).
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
