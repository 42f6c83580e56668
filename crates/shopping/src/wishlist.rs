use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use motormart_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use motormart_events::Event;
use motormart_listings::ListingId;

/// Wishlist identifier, derived from the owning buyer's user id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WishlistId(pub AggregateId);

impl WishlistId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    /// The wishlist stream for a buyer shares the buyer's uuid.
    pub fn for_buyer(buyer_id: UserId) -> Self {
        Self(AggregateId::from(buyer_id))
    }
}

impl core::fmt::Display for WishlistId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: a buyer's saved listings.
///
/// Saves are idempotent: saving an already-saved listing (or unsaving an
/// absent one) emits nothing, so repeated clicks don't pollute the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wishlist {
    id: WishlistId,
    tenant_id: Option<TenantId>,
    buyer_id: Option<UserId>,
    listings: Vec<ListingId>,
    version: u64,
    opened: bool,
}

impl Wishlist {
    /// Create an empty, not-yet-opened aggregate instance for rehydration.
    pub fn empty(id: WishlistId) -> Self {
        Self {
            id,
            tenant_id: None,
            buyer_id: None,
            listings: Vec::new(),
            version: 0,
            opened: false,
        }
    }

    pub fn id_typed(&self) -> WishlistId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn buyer_id(&self) -> Option<UserId> {
        self.buyer_id
    }

    pub fn listings(&self) -> &[ListingId] {
        &self.listings
    }

    pub fn contains(&self, listing_id: ListingId) -> bool {
        self.listings.contains(&listing_id)
    }
}

impl AggregateRoot for Wishlist {
    type Id = WishlistId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: SaveListing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveListing {
    pub tenant_id: TenantId,
    pub wishlist_id: WishlistId,
    pub buyer_id: UserId,
    pub listing_id: ListingId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UnsaveListing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsaveListing {
    pub tenant_id: TenantId,
    pub wishlist_id: WishlistId,
    pub listing_id: ListingId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WishlistCommand {
    SaveListing(SaveListing),
    UnsaveListing(UnsaveListing),
}

/// Event: WishlistOpened. First event on every wishlist stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistOpened {
    pub tenant_id: TenantId,
    pub wishlist_id: WishlistId,
    pub buyer_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ListingSaved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingSaved {
    pub tenant_id: TenantId,
    pub wishlist_id: WishlistId,
    pub listing_id: ListingId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ListingUnsaved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingUnsaved {
    pub tenant_id: TenantId,
    pub wishlist_id: WishlistId,
    pub listing_id: ListingId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WishlistEvent {
    WishlistOpened(WishlistOpened),
    ListingSaved(ListingSaved),
    ListingUnsaved(ListingUnsaved),
}

impl Event for WishlistEvent {
    fn event_type(&self) -> &'static str {
        match self {
            WishlistEvent::WishlistOpened(_) => "shopping.wishlist.opened",
            WishlistEvent::ListingSaved(_) => "shopping.wishlist.listing_saved",
            WishlistEvent::ListingUnsaved(_) => "shopping.wishlist.listing_unsaved",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            WishlistEvent::WishlistOpened(e) => e.occurred_at,
            WishlistEvent::ListingSaved(e) => e.occurred_at,
            WishlistEvent::ListingUnsaved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Wishlist {
    type Command = WishlistCommand;
    type Event = WishlistEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            WishlistEvent::WishlistOpened(e) => {
                self.id = e.wishlist_id;
                self.tenant_id = Some(e.tenant_id);
                self.buyer_id = Some(e.buyer_id);
                self.opened = true;
            }
            WishlistEvent::ListingSaved(e) => {
                if !self.listings.contains(&e.listing_id) {
                    self.listings.push(e.listing_id);
                }
            }
            WishlistEvent::ListingUnsaved(e) => {
                self.listings.retain(|id| *id != e.listing_id);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            WishlistCommand::SaveListing(cmd) => self.handle_save(cmd),
            WishlistCommand::UnsaveListing(cmd) => self.handle_unsave(cmd),
        }
    }
}

impl Wishlist {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.opened {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn handle_save(&self, cmd: &SaveListing) -> Result<Vec<WishlistEvent>, DomainError> {
        self.ensure_tenant(cmd.tenant_id)?;
        if self.id != cmd.wishlist_id {
            return Err(DomainError::invariant("wishlist_id mismatch"));
        }

        if self.contains(cmd.listing_id) {
            return Ok(vec![]);
        }

        let mut events = Vec::new();
        if !self.opened {
            events.push(WishlistEvent::WishlistOpened(WishlistOpened {
                tenant_id: cmd.tenant_id,
                wishlist_id: cmd.wishlist_id,
                buyer_id: cmd.buyer_id,
                occurred_at: cmd.occurred_at,
            }));
        }
        events.push(WishlistEvent::ListingSaved(ListingSaved {
            tenant_id: cmd.tenant_id,
            wishlist_id: cmd.wishlist_id,
            listing_id: cmd.listing_id,
            occurred_at: cmd.occurred_at,
        }));

        Ok(events)
    }

    fn handle_unsave(&self, cmd: &UnsaveListing) -> Result<Vec<WishlistEvent>, DomainError> {
        if !self.opened {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        if self.id != cmd.wishlist_id {
            return Err(DomainError::invariant("wishlist_id mismatch"));
        }

        if !self.contains(cmd.listing_id) {
            return Ok(vec![]);
        }

        Ok(vec![WishlistEvent::ListingUnsaved(ListingUnsaved {
            tenant_id: cmd.tenant_id,
            wishlist_id: cmd.wishlist_id,
            listing_id: cmd.listing_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_buyer_id() -> UserId {
        UserId::new()
    }

    fn test_listing_id() -> ListingId {
        ListingId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn save_cmd(
        tenant_id: TenantId,
        wishlist_id: WishlistId,
        buyer_id: UserId,
        listing_id: ListingId,
    ) -> WishlistCommand {
        WishlistCommand::SaveListing(SaveListing {
            tenant_id,
            wishlist_id,
            buyer_id,
            listing_id,
            occurred_at: test_time(),
        })
    }

    #[test]
    fn first_save_opens_wishlist() {
        let tenant_id = test_tenant_id();
        let buyer_id = test_buyer_id();
        let wishlist_id = WishlistId::for_buyer(buyer_id);
        let listing_id = test_listing_id();
        let wishlist = Wishlist::empty(wishlist_id);

        let events = wishlist
            .handle(&save_cmd(tenant_id, wishlist_id, buyer_id, listing_id))
            .unwrap();

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], WishlistEvent::WishlistOpened(_)));
        assert!(matches!(events[1], WishlistEvent::ListingSaved(_)));
    }

    #[test]
    fn saving_twice_is_idempotent() {
        let tenant_id = test_tenant_id();
        let buyer_id = test_buyer_id();
        let wishlist_id = WishlistId::for_buyer(buyer_id);
        let listing_id = test_listing_id();
        let mut wishlist = Wishlist::empty(wishlist_id);

        for event in &wishlist
            .handle(&save_cmd(tenant_id, wishlist_id, buyer_id, listing_id))
            .unwrap()
        {
            wishlist.apply(event);
        }
        assert!(wishlist.contains(listing_id));

        let events = wishlist
            .handle(&save_cmd(tenant_id, wishlist_id, buyer_id, listing_id))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn unsave_removes_listing() {
        let tenant_id = test_tenant_id();
        let buyer_id = test_buyer_id();
        let wishlist_id = WishlistId::for_buyer(buyer_id);
        let listing_id = test_listing_id();
        let mut wishlist = Wishlist::empty(wishlist_id);

        for event in &wishlist
            .handle(&save_cmd(tenant_id, wishlist_id, buyer_id, listing_id))
            .unwrap()
        {
            wishlist.apply(event);
        }

        let events = wishlist
            .handle(&WishlistCommand::UnsaveListing(UnsaveListing {
                tenant_id,
                wishlist_id,
                listing_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        assert_eq!(events.len(), 1);
        for event in &events {
            wishlist.apply(event);
        }
        assert!(!wishlist.contains(listing_id));
    }

    #[test]
    fn unsave_absent_listing_emits_nothing() {
        let tenant_id = test_tenant_id();
        let buyer_id = test_buyer_id();
        let wishlist_id = WishlistId::for_buyer(buyer_id);
        let mut wishlist = Wishlist::empty(wishlist_id);

        for event in &wishlist
            .handle(&save_cmd(
                tenant_id,
                wishlist_id,
                buyer_id,
                test_listing_id(),
            ))
            .unwrap()
        {
            wishlist.apply(event);
        }

        let events = wishlist
            .handle(&WishlistCommand::UnsaveListing(UnsaveListing {
                tenant_id,
                wishlist_id,
                listing_id: test_listing_id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn unsave_on_fresh_stream_is_not_found() {
        let wishlist = Wishlist::empty(WishlistId::for_buyer(test_buyer_id()));

        let err = wishlist
            .handle(&WishlistCommand::UnsaveListing(UnsaveListing {
                tenant_id: test_tenant_id(),
                wishlist_id: wishlist.id_typed(),
                listing_id: test_listing_id(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[test]
    fn tenant_mismatch_rejected() {
        let tenant_id = test_tenant_id();
        let buyer_id = test_buyer_id();
        let wishlist_id = WishlistId::for_buyer(buyer_id);
        let mut wishlist = Wishlist::empty(wishlist_id);

        for event in &wishlist
            .handle(&save_cmd(
                tenant_id,
                wishlist_id,
                buyer_id,
                test_listing_id(),
            ))
            .unwrap()
        {
            wishlist.apply(event);
        }

        let err = wishlist
            .handle(&save_cmd(
                test_tenant_id(),
                wishlist_id,
                buyer_id,
                test_listing_id(),
            ))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) => assert!(msg.contains("tenant")),
            _ => panic!("Expected InvariantViolation for tenant mismatch"),
        }
    }
}
