//! Wishlists projection: saved listings per buyer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use motormart_core::{TenantId, UserId};
use motormart_events::EventEnvelope;
use motormart_listings::ListingId;
use motormart_shopping::{WishlistEvent, WishlistId};

use crate::read_model::TenantStore;

/// Wishlist read model for queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistReadModel {
    pub wishlist_id: WishlistId,
    pub buyer_id: UserId,
    pub listings: Vec<ListingId>,
    pub updated_at: DateTime<Utc>,
}

/// Projection that maintains the per-buyer wishlist read model.
pub struct WishlistsProjection<S> {
    store: S,
}

impl<S> WishlistsProjection<S>
where
    S: TenantStore<WishlistId, WishlistReadModel>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn for_buyer(&self, tenant_id: TenantId, buyer_id: UserId) -> Option<WishlistReadModel> {
        self.store.get(tenant_id, &WishlistId::for_buyer(buyer_id))
    }

    pub fn is_saved(&self, tenant_id: TenantId, buyer_id: UserId, listing_id: ListingId) -> bool {
        self.for_buyer(tenant_id, buyer_id)
            .map(|w| w.listings.contains(&listing_id))
            .unwrap_or(false)
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<serde_json::Value>,
    ) -> Result<(), anyhow::Error> {
        if envelope.aggregate_type() != "shopping.wishlist" {
            return Ok(());
        }

        let event: WishlistEvent = serde_json::from_value(envelope.payload().clone())?;
        let tenant_id = envelope.tenant_id();

        match event {
            WishlistEvent::WishlistOpened(e) => {
                self.store.upsert(
                    tenant_id,
                    e.wishlist_id,
                    WishlistReadModel {
                        wishlist_id: e.wishlist_id,
                        buyer_id: e.buyer_id,
                        listings: vec![],
                        updated_at: e.occurred_at,
                    },
                );
            }
            WishlistEvent::ListingSaved(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.wishlist_id) {
                    if !rm.listings.contains(&e.listing_id) {
                        rm.listings.push(e.listing_id);
                    }
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.wishlist_id, rm);
                }
            }
            WishlistEvent::ListingUnsaved(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.wishlist_id) {
                    rm.listings.retain(|id| *id != e.listing_id);
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.wishlist_id, rm);
                }
            }
        }

        Ok(())
    }
}
