//! Carts projection: one read model per buyer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use motormart_core::{TenantId, UserId};
use motormart_events::EventEnvelope;
use motormart_shopping::{CartEvent, CartId, CartItem};

use crate::read_model::TenantStore;

/// Cart read model for queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartReadModel {
    pub cart_id: CartId,
    pub buyer_id: UserId,
    pub items: Vec<CartItem>,
    pub updated_at: DateTime<Utc>,
}

impl CartReadModel {
    pub fn subtotal_cents(&self) -> u64 {
        self.items
            .iter()
            .map(|i| i.unit_price_cents.saturating_mul(i.quantity as u64))
            .sum()
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

/// Projection that maintains the per-buyer cart read model.
pub struct CartsProjection<S> {
    store: S,
}

impl<S> CartsProjection<S>
where
    S: TenantStore<CartId, CartReadModel>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn get(&self, tenant_id: TenantId, cart_id: &CartId) -> Option<CartReadModel> {
        self.store.get(tenant_id, cart_id)
    }

    /// The buyer's cart, if it has ever been opened and not since cleared.
    pub fn for_buyer(&self, tenant_id: TenantId, buyer_id: UserId) -> Option<CartReadModel> {
        self.get(tenant_id, &CartId::for_buyer(buyer_id))
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<serde_json::Value>,
    ) -> Result<(), anyhow::Error> {
        if envelope.aggregate_type() != "shopping.cart" {
            return Ok(());
        }

        let event: CartEvent = serde_json::from_value(envelope.payload().clone())?;
        let tenant_id = envelope.tenant_id();

        match event {
            CartEvent::CartOpened(e) => {
                self.store.upsert(
                    tenant_id,
                    e.cart_id,
                    CartReadModel {
                        cart_id: e.cart_id,
                        buyer_id: e.buyer_id,
                        items: vec![],
                        updated_at: e.occurred_at,
                    },
                );
            }
            CartEvent::ItemAdded(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.cart_id) {
                    rm.items.push(CartItem {
                        listing_id: e.listing_id,
                        listing_name: e.listing_name,
                        unit_price_cents: e.unit_price_cents,
                        quantity: 1,
                    });
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.cart_id, rm);
                }
            }
            CartEvent::ItemQuantityChanged(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.cart_id) {
                    if let Some(item) =
                        rm.items.iter_mut().find(|i| i.listing_id == e.listing_id)
                    {
                        item.quantity = e.new_quantity;
                    }
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.cart_id, rm);
                }
            }
            CartEvent::ItemRemoved(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.cart_id) {
                    rm.items.retain(|i| i.listing_id != e.listing_id);
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.cart_id, rm);
                }
            }
            CartEvent::CartCleared(e) => {
                // A cleared cart disappears until the next add reopens it.
                self.store.remove(tenant_id, &e.cart_id);
            }
        }

        Ok(())
    }
}
