//! Event query interface for inspection and debugging.
//!
//! Read-only, tenant-scoped, paginated access to stored events. Backs the
//! admin event inspection endpoints.

use chrono::{DateTime, Utc};
use motormart_core::{AggregateId, TenantId};
use serde::{Deserialize, Serialize};

use crate::event_store::{EventStoreError, StoredEvent};

/// Pagination parameters for event queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of events to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            // Cap at 1000 for safety.
            limit: limit.unwrap_or(50).min(1000),
            offset: offset.unwrap_or(0),
        }
    }
}

/// Filter criteria for event queries. All fields are optional and combine
/// with AND semantics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    pub aggregate_id: Option<AggregateId>,
    /// e.g. "listings.listing"
    pub aggregate_type: Option<String>,
    /// e.g. "listings.listing.created"
    pub event_type: Option<String>,
    pub occurred_after: Option<DateTime<Utc>>,
    pub occurred_before: Option<DateTime<Utc>>,
}

impl EventFilter {
    pub fn matches(&self, event: &StoredEvent) -> bool {
        if let Some(id) = self.aggregate_id {
            if event.aggregate_id != id {
                return false;
            }
        }
        if let Some(ref t) = self.aggregate_type {
            if &event.aggregate_type != t {
                return false;
            }
        }
        if let Some(ref t) = self.event_type {
            if &event.event_type != t {
                return false;
            }
        }
        if let Some(after) = self.occurred_after {
            if event.occurred_at <= after {
                return false;
            }
        }
        if let Some(before) = self.occurred_before {
            if event.occurred_at >= before {
                return false;
            }
        }
        true
    }
}

/// Paginated event query result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventQueryResult {
    pub events: Vec<StoredEvent>,
    /// Total matches across all pages.
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

/// Async query interface for event inspection.
#[async_trait::async_trait]
pub trait EventQuery: Send + Sync {
    /// Query tenant events with optional filters and pagination.
    ///
    /// Results are ordered by `occurred_at` descending, then sequence number
    /// ascending for equal timestamps.
    async fn query_events(
        &self,
        tenant_id: TenantId,
        filter: EventFilter,
        pagination: Pagination,
    ) -> Result<EventQueryResult, EventStoreError>;

    /// Convenience query for one aggregate's events.
    ///
    /// Orders by `occurred_at` descending like `query_events`; use
    /// `load_stream` when sequence order matters.
    async fn get_aggregate_events(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        pagination: Option<Pagination>,
    ) -> Result<EventQueryResult, EventStoreError> {
        let filter = EventFilter {
            aggregate_id: Some(aggregate_id),
            ..Default::default()
        };
        self.query_events(tenant_id, filter, pagination.unwrap_or_default())
            .await
    }

    /// Fetch a single event by id, if it exists and belongs to the tenant.
    async fn get_event_by_id(
        &self,
        tenant_id: TenantId,
        event_id: uuid::Uuid,
    ) -> Result<Option<StoredEvent>, EventStoreError>;
}
