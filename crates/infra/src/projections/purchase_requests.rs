//! Purchase requests projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use motormart_core::{TenantId, UserId};
use motormart_events::EventEnvelope;
use motormart_listings::ListingId;
use motormart_messaging::{PurchaseRequestEvent, PurchaseRequestId, RequestStatus};

use crate::read_model::TenantStore;

/// Purchase request read model for queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequestReadModel {
    pub request_id: PurchaseRequestId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub listing_id: ListingId,
    pub message: String,
    pub offered_price_cents: Option<u64>,
    pub response: Option<String>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Projection that maintains purchase requests per tenant.
pub struct PurchaseRequestsProjection<S> {
    store: S,
}

impl<S> PurchaseRequestsProjection<S>
where
    S: TenantStore<PurchaseRequestId, PurchaseRequestReadModel>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn get(
        &self,
        tenant_id: TenantId,
        request_id: &PurchaseRequestId,
    ) -> Option<PurchaseRequestReadModel> {
        self.store.get(tenant_id, request_id)
    }

    /// Requests the buyer has made, newest first.
    pub fn list_for_buyer(
        &self,
        tenant_id: TenantId,
        buyer_id: UserId,
    ) -> Vec<PurchaseRequestReadModel> {
        let mut requests: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|r| r.buyer_id == buyer_id)
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        requests
    }

    /// Requests targeting the seller's listings, newest first.
    pub fn list_for_seller(
        &self,
        tenant_id: TenantId,
        seller_id: UserId,
    ) -> Vec<PurchaseRequestReadModel> {
        let mut requests: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|r| r.seller_id == seller_id)
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        requests
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<serde_json::Value>,
    ) -> Result<(), anyhow::Error> {
        if envelope.aggregate_type() != "messaging.purchase_request" {
            return Ok(());
        }

        let event: PurchaseRequestEvent = serde_json::from_value(envelope.payload().clone())?;
        let tenant_id = envelope.tenant_id();

        match event {
            PurchaseRequestEvent::PurchaseRequestCreated(e) => {
                self.store.upsert(
                    tenant_id,
                    e.request_id,
                    PurchaseRequestReadModel {
                        request_id: e.request_id,
                        buyer_id: e.buyer_id,
                        seller_id: e.seller_id,
                        listing_id: e.listing_id,
                        message: e.message,
                        offered_price_cents: e.offered_price_cents,
                        response: None,
                        status: RequestStatus::Pending,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            PurchaseRequestEvent::PurchaseRequestResponded(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.request_id) {
                    rm.response = Some(e.response);
                    rm.status = RequestStatus::Responded;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.request_id, rm);
                }
            }
            PurchaseRequestEvent::PurchaseRequestClosed(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.request_id) {
                    rm.status = RequestStatus::Closed;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.request_id, rm);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_model::InMemoryTenantStore;
    use motormart_core::AggregateId;
    use motormart_messaging::{PurchaseRequestCreated, PurchaseRequestResponded};
    use std::sync::Arc;
    use uuid::Uuid;

    fn envelope(
        tenant_id: TenantId,
        request_id: PurchaseRequestId,
        seq: u64,
        event: PurchaseRequestEvent,
    ) -> EventEnvelope<serde_json::Value> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            request_id.0,
            "messaging.purchase_request",
            seq,
            serde_json::to_value(&event).unwrap(),
        )
    }

    #[test]
    fn request_lifecycle_reflected_in_read_model() {
        let projection = PurchaseRequestsProjection::new(Arc::new(InMemoryTenantStore::new()));
        let tenant_id = TenantId::new();
        let request_id = PurchaseRequestId::new(AggregateId::new());
        let buyer_id = UserId::new();
        let seller_id = UserId::new();
        let now = Utc::now();

        projection
            .apply_envelope(&envelope(
                tenant_id,
                request_id,
                1,
                PurchaseRequestEvent::PurchaseRequestCreated(PurchaseRequestCreated {
                    tenant_id,
                    request_id,
                    buyer_id,
                    seller_id,
                    listing_id: ListingId::new(AggregateId::new()),
                    message: "Would you take less?".to_string(),
                    offered_price_cents: Some(1_500_000),
                    occurred_at: now,
                }),
            ))
            .unwrap();

        assert_eq!(projection.list_for_buyer(tenant_id, buyer_id).len(), 1);
        assert_eq!(projection.list_for_seller(tenant_id, seller_id).len(), 1);

        projection
            .apply_envelope(&envelope(
                tenant_id,
                request_id,
                2,
                PurchaseRequestEvent::PurchaseRequestResponded(PurchaseRequestResponded {
                    tenant_id,
                    request_id,
                    response: "Happy to discuss.".to_string(),
                    occurred_at: now,
                }),
            ))
            .unwrap();

        let rm = projection.get(tenant_id, &request_id).unwrap();
        assert_eq!(rm.status, RequestStatus::Responded);
        assert_eq!(rm.response.as_deref(), Some("Happy to discuss."));
    }
}
