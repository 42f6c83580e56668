use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use motormart_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use motormart_events::Event;
use motormart_listings::ListingId;

/// Cart identifier, derived from the owning buyer's user id.
///
/// One cart stream per buyer per tenant; there is no anonymous or shared
/// cart.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartId(pub AggregateId);

impl CartId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    /// The cart stream for a buyer shares the buyer's uuid.
    pub fn for_buyer(buyer_id: UserId) -> Self {
        Self(AggregateId::from(buyer_id))
    }
}

impl core::fmt::Display for CartId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One listing line in the cart.
///
/// Name and unit price are snapshots from the catalog at the time the item
/// was added; checkout re-reads the catalog for current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub listing_id: ListingId,
    pub listing_name: String,
    pub unit_price_cents: u64,
    pub quantity: u32,
}

/// Aggregate root: a buyer's shopping cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    id: CartId,
    tenant_id: Option<TenantId>,
    buyer_id: Option<UserId>,
    items: Vec<CartItem>,
    version: u64,
    opened: bool,
}

impl Cart {
    /// Create an empty, not-yet-opened aggregate instance for rehydration.
    pub fn empty(id: CartId) -> Self {
        Self {
            id,
            tenant_id: None,
            buyer_id: None,
            items: Vec::new(),
            version: 0,
            opened: false,
        }
    }

    pub fn id_typed(&self) -> CartId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn buyer_id(&self) -> Option<UserId> {
        self.buyer_id
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of line totals, in cents.
    pub fn subtotal(&self) -> u64 {
        self.items
            .iter()
            .map(|item| u64::from(item.quantity) * item.unit_price_cents)
            .sum()
    }

    /// Sum of quantities across all lines.
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    fn item(&self, listing_id: ListingId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.listing_id == listing_id)
    }
}

impl AggregateRoot for Cart {
    type Id = CartId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────
//
// Mutating commands carry `available_stock`: the stock the catalog read model
// reported at command time. The aggregate rejects quantities above it;
// checkout re-validates against live stock anyway.

/// Command: AddItem. Adds one unit, merging into an existing line. The first
/// mutation of a fresh stream also opens the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItem {
    pub tenant_id: TenantId,
    pub cart_id: CartId,
    pub buyer_id: UserId,
    pub listing_id: ListingId,
    pub listing_name: String,
    pub unit_price_cents: u64,
    pub available_stock: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: IncrementItem (+1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementItem {
    pub tenant_id: TenantId,
    pub cart_id: CartId,
    pub listing_id: ListingId,
    pub available_stock: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DecrementItem (−1; removing the last unit removes the line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecrementItem {
    pub tenant_id: TenantId,
    pub cart_id: CartId,
    pub listing_id: ListingId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetItemQuantity (0 removes the line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetItemQuantity {
    pub tenant_id: TenantId,
    pub cart_id: CartId,
    pub listing_id: ListingId,
    pub quantity: u32,
    pub available_stock: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItem {
    pub tenant_id: TenantId,
    pub cart_id: CartId,
    pub listing_id: ListingId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ClearCart. Clearing an already-empty cart emits nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearCart {
    pub tenant_id: TenantId,
    pub cart_id: CartId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartCommand {
    AddItem(AddItem),
    IncrementItem(IncrementItem),
    DecrementItem(DecrementItem),
    SetItemQuantity(SetItemQuantity),
    RemoveItem(RemoveItem),
    ClearCart(ClearCart),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// Event: CartOpened. First event on every cart stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartOpened {
    pub tenant_id: TenantId,
    pub cart_id: CartId,
    pub buyer_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemAdded. A new line with quantity 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdded {
    pub tenant_id: TenantId,
    pub cart_id: CartId,
    pub listing_id: ListingId,
    pub listing_name: String,
    pub unit_price_cents: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemQuantityChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuantityChanged {
    pub tenant_id: TenantId,
    pub cart_id: CartId,
    pub listing_id: ListingId,
    pub new_quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRemoved {
    pub tenant_id: TenantId,
    pub cart_id: CartId,
    pub listing_id: ListingId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CartCleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartCleared {
    pub tenant_id: TenantId,
    pub cart_id: CartId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartEvent {
    CartOpened(CartOpened),
    ItemAdded(ItemAdded),
    ItemQuantityChanged(ItemQuantityChanged),
    ItemRemoved(ItemRemoved),
    CartCleared(CartCleared),
}

impl Event for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::CartOpened(_) => "shopping.cart.opened",
            CartEvent::ItemAdded(_) => "shopping.cart.item_added",
            CartEvent::ItemQuantityChanged(_) => "shopping.cart.item_quantity_changed",
            CartEvent::ItemRemoved(_) => "shopping.cart.item_removed",
            CartEvent::CartCleared(_) => "shopping.cart.cleared",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CartEvent::CartOpened(e) => e.occurred_at,
            CartEvent::ItemAdded(e) => e.occurred_at,
            CartEvent::ItemQuantityChanged(e) => e.occurred_at,
            CartEvent::ItemRemoved(e) => e.occurred_at,
            CartEvent::CartCleared(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for Cart {
    type Command = CartCommand;
    type Event = CartEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CartEvent::CartOpened(e) => {
                self.id = e.cart_id;
                self.tenant_id = Some(e.tenant_id);
                self.buyer_id = Some(e.buyer_id);
                self.opened = true;
            }
            CartEvent::ItemAdded(e) => {
                self.items.push(CartItem {
                    listing_id: e.listing_id,
                    listing_name: e.listing_name.clone(),
                    unit_price_cents: e.unit_price_cents,
                    quantity: 1,
                });
            }
            CartEvent::ItemQuantityChanged(e) => {
                if let Some(item) = self
                    .items
                    .iter_mut()
                    .find(|item| item.listing_id == e.listing_id)
                {
                    item.quantity = e.new_quantity;
                }
            }
            CartEvent::ItemRemoved(e) => {
                self.items.retain(|item| item.listing_id != e.listing_id);
            }
            CartEvent::CartCleared(_) => {
                self.items.clear();
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CartCommand::AddItem(cmd) => self.handle_add(cmd),
            CartCommand::IncrementItem(cmd) => self.handle_increment(cmd),
            CartCommand::DecrementItem(cmd) => self.handle_decrement(cmd),
            CartCommand::SetItemQuantity(cmd) => self.handle_set_quantity(cmd),
            CartCommand::RemoveItem(cmd) => self.handle_remove(cmd),
            CartCommand::ClearCart(cmd) => self.handle_clear(cmd),
        }
    }
}

impl Cart {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.opened {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_cart_id(&self, cart_id: CartId) -> Result<(), DomainError> {
        if self.id != cart_id {
            return Err(DomainError::invariant("cart_id mismatch"));
        }
        Ok(())
    }

    fn existing_item(&self, listing_id: ListingId) -> Result<&CartItem, DomainError> {
        self.item(listing_id)
            .ok_or_else(|| DomainError::invariant("item not in cart"))
    }

    fn handle_add(&self, cmd: &AddItem) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_cart_id(cmd.cart_id)?;

        if cmd.listing_name.trim().is_empty() {
            return Err(DomainError::validation("listing name cannot be empty"));
        }
        if cmd.unit_price_cents == 0 {
            return Err(DomainError::validation("unit price must be greater than zero"));
        }
        if cmd.available_stock == 0 {
            return Err(DomainError::invariant("listing is out of stock"));
        }

        let mut events = Vec::new();

        if !self.opened {
            events.push(CartEvent::CartOpened(CartOpened {
                tenant_id: cmd.tenant_id,
                cart_id: cmd.cart_id,
                buyer_id: cmd.buyer_id,
                occurred_at: cmd.occurred_at,
            }));
        }

        match self.item(cmd.listing_id) {
            Some(item) => {
                let new_quantity = item.quantity + 1;
                if new_quantity > cmd.available_stock {
                    return Err(DomainError::invariant("not enough stock available"));
                }
                events.push(CartEvent::ItemQuantityChanged(ItemQuantityChanged {
                    tenant_id: cmd.tenant_id,
                    cart_id: cmd.cart_id,
                    listing_id: cmd.listing_id,
                    new_quantity,
                    occurred_at: cmd.occurred_at,
                }));
            }
            None => {
                events.push(CartEvent::ItemAdded(ItemAdded {
                    tenant_id: cmd.tenant_id,
                    cart_id: cmd.cart_id,
                    listing_id: cmd.listing_id,
                    listing_name: cmd.listing_name.trim().to_string(),
                    unit_price_cents: cmd.unit_price_cents,
                    occurred_at: cmd.occurred_at,
                }));
            }
        }

        Ok(events)
    }

    fn handle_increment(&self, cmd: &IncrementItem) -> Result<Vec<CartEvent>, DomainError> {
        if !self.opened {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_cart_id(cmd.cart_id)?;

        let item = self.existing_item(cmd.listing_id)?;
        let new_quantity = item.quantity + 1;
        if new_quantity > cmd.available_stock {
            return Err(DomainError::invariant("not enough stock available"));
        }

        Ok(vec![CartEvent::ItemQuantityChanged(ItemQuantityChanged {
            tenant_id: cmd.tenant_id,
            cart_id: cmd.cart_id,
            listing_id: cmd.listing_id,
            new_quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_decrement(&self, cmd: &DecrementItem) -> Result<Vec<CartEvent>, DomainError> {
        if !self.opened {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_cart_id(cmd.cart_id)?;

        let item = self.existing_item(cmd.listing_id)?;

        if item.quantity <= 1 {
            Ok(vec![CartEvent::ItemRemoved(ItemRemoved {
                tenant_id: cmd.tenant_id,
                cart_id: cmd.cart_id,
                listing_id: cmd.listing_id,
                occurred_at: cmd.occurred_at,
            })])
        } else {
            Ok(vec![CartEvent::ItemQuantityChanged(ItemQuantityChanged {
                tenant_id: cmd.tenant_id,
                cart_id: cmd.cart_id,
                listing_id: cmd.listing_id,
                new_quantity: item.quantity - 1,
                occurred_at: cmd.occurred_at,
            })])
        }
    }

    fn handle_set_quantity(&self, cmd: &SetItemQuantity) -> Result<Vec<CartEvent>, DomainError> {
        if !self.opened {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_cart_id(cmd.cart_id)?;

        self.existing_item(cmd.listing_id)?;

        if cmd.quantity == 0 {
            return Ok(vec![CartEvent::ItemRemoved(ItemRemoved {
                tenant_id: cmd.tenant_id,
                cart_id: cmd.cart_id,
                listing_id: cmd.listing_id,
                occurred_at: cmd.occurred_at,
            })]);
        }

        if cmd.quantity > cmd.available_stock {
            return Err(DomainError::invariant("not enough stock available"));
        }

        Ok(vec![CartEvent::ItemQuantityChanged(ItemQuantityChanged {
            tenant_id: cmd.tenant_id,
            cart_id: cmd.cart_id,
            listing_id: cmd.listing_id,
            new_quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove(&self, cmd: &RemoveItem) -> Result<Vec<CartEvent>, DomainError> {
        if !self.opened {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_cart_id(cmd.cart_id)?;

        self.existing_item(cmd.listing_id)?;

        Ok(vec![CartEvent::ItemRemoved(ItemRemoved {
            tenant_id: cmd.tenant_id,
            cart_id: cmd.cart_id,
            listing_id: cmd.listing_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_clear(&self, cmd: &ClearCart) -> Result<Vec<CartEvent>, DomainError> {
        if !self.opened {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_cart_id(cmd.cart_id)?;

        if self.items.is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![CartEvent::CartCleared(CartCleared {
            tenant_id: cmd.tenant_id,
            cart_id: cmd.cart_id,
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

    fn add_cmd(
        tenant_id: TenantId,
        cart_id: CartId,
        buyer_id: UserId,
        listing_id: ListingId,
    ) -> AddItem {
        AddItem {
            tenant_id,
            cart_id,
            buyer_id,
            listing_id,
            listing_name: "2020 Mazda 3".to_string(),
            unit_price_cents: 1_680_000,
            available_stock: 3,
            occurred_at: test_time(),
        }
    }

    fn cart_with_item(
        tenant_id: TenantId,
        buyer_id: UserId,
        listing_id: ListingId,
    ) -> Cart {
        let cart_id = CartId::for_buyer(buyer_id);
        let mut cart = Cart::empty(cart_id);
        let events = cart
            .handle(&CartCommand::AddItem(add_cmd(
                tenant_id, cart_id, buyer_id, listing_id,
            )))
            .unwrap();
        for event in &events {
            cart.apply(event);
        }
        cart
    }

    #[test]
    fn cart_id_is_derived_from_buyer() {
        let buyer_id = test_buyer_id();
        assert_eq!(CartId::for_buyer(buyer_id), CartId::for_buyer(buyer_id));
    }

    #[test]
    fn first_add_opens_cart_and_adds_item() {
        let tenant_id = test_tenant_id();
        let buyer_id = test_buyer_id();
        let listing_id = test_listing_id();
        let cart_id = CartId::for_buyer(buyer_id);
        let cart = Cart::empty(cart_id);

        let events = cart
            .handle(&CartCommand::AddItem(add_cmd(
                tenant_id, cart_id, buyer_id, listing_id,
            )))
            .unwrap();

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], CartEvent::CartOpened(_)));
        assert!(matches!(events[1], CartEvent::ItemAdded(_)));
    }

    #[test]
    fn adding_same_listing_merges_quantity() {
        let tenant_id = test_tenant_id();
        let buyer_id = test_buyer_id();
        let listing_id = test_listing_id();
        let mut cart = cart_with_item(tenant_id, buyer_id, listing_id);

        let events = cart
            .handle(&CartCommand::AddItem(add_cmd(
                tenant_id,
                cart.id_typed(),
                buyer_id,
                listing_id,
            )))
            .unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            CartEvent::ItemQuantityChanged(e) => assert_eq!(e.new_quantity, 2),
            _ => panic!("Expected ItemQuantityChanged event"),
        }

        for event in &events {
            cart.apply(event);
        }
        assert_eq!(cart.item_count(), 2);
        assert_eq!(cart.items().len(), 1);
    }

    #[test]
    fn add_rejects_when_stock_exhausted() {
        let tenant_id = test_tenant_id();
        let buyer_id = test_buyer_id();
        let listing_id = test_listing_id();
        let cart = cart_with_item(tenant_id, buyer_id, listing_id);

        let mut cmd = add_cmd(tenant_id, cart.id_typed(), buyer_id, listing_id);
        cmd.available_stock = 1;

        let err = cart.handle(&CartCommand::AddItem(cmd)).unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) => assert!(msg.contains("stock")),
            _ => panic!("Expected InvariantViolation for stock"),
        }
    }

    #[test]
    fn add_rejects_out_of_stock_listing() {
        let tenant_id = test_tenant_id();
        let buyer_id = test_buyer_id();
        let cart_id = CartId::for_buyer(buyer_id);
        let cart = Cart::empty(cart_id);

        let mut cmd = add_cmd(tenant_id, cart_id, buyer_id, test_listing_id());
        cmd.available_stock = 0;

        let err = cart.handle(&CartCommand::AddItem(cmd)).unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) => assert!(msg.contains("out of stock")),
            _ => panic!("Expected InvariantViolation for out of stock"),
        }
    }

    #[test]
    fn decrement_last_unit_removes_line() {
        let tenant_id = test_tenant_id();
        let buyer_id = test_buyer_id();
        let listing_id = test_listing_id();
        let mut cart = cart_with_item(tenant_id, buyer_id, listing_id);

        let events = cart
            .handle(&CartCommand::DecrementItem(DecrementItem {
                tenant_id,
                cart_id: cart.id_typed(),
                listing_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(matches!(events[0], CartEvent::ItemRemoved(_)));

        for event in &events {
            cart.apply(event);
        }
        assert!(cart.is_empty());
    }

    #[test]
    fn set_quantity_zero_removes_line() {
        let tenant_id = test_tenant_id();
        let buyer_id = test_buyer_id();
        let listing_id = test_listing_id();
        let cart = cart_with_item(tenant_id, buyer_id, listing_id);

        let events = cart
            .handle(&CartCommand::SetItemQuantity(SetItemQuantity {
                tenant_id,
                cart_id: cart.id_typed(),
                listing_id,
                quantity: 0,
                available_stock: 3,
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(matches!(events[0], CartEvent::ItemRemoved(_)));
    }

    #[test]
    fn set_quantity_respects_available_stock() {
        let tenant_id = test_tenant_id();
        let buyer_id = test_buyer_id();
        let listing_id = test_listing_id();
        let cart = cart_with_item(tenant_id, buyer_id, listing_id);

        let err = cart
            .handle(&CartCommand::SetItemQuantity(SetItemQuantity {
                tenant_id,
                cart_id: cart.id_typed(),
                listing_id,
                quantity: 5,
                available_stock: 3,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn operations_on_missing_item_are_rejected() {
        let tenant_id = test_tenant_id();
        let buyer_id = test_buyer_id();
        let cart = cart_with_item(tenant_id, buyer_id, test_listing_id());

        let err = cart
            .handle(&CartCommand::RemoveItem(RemoveItem {
                tenant_id,
                cart_id: cart.id_typed(),
                listing_id: test_listing_id(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) => assert!(msg.contains("not in cart")),
            _ => panic!("Expected InvariantViolation for missing item"),
        }
    }

    #[test]
    fn operations_on_fresh_stream_are_not_found() {
        let tenant_id = test_tenant_id();
        let buyer_id = test_buyer_id();
        let cart_id = CartId::for_buyer(buyer_id);
        let cart = Cart::empty(cart_id);

        let err = cart
            .handle(&CartCommand::ClearCart(ClearCart {
                tenant_id,
                cart_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[test]
    fn clear_cart_empties_all_lines() {
        let tenant_id = test_tenant_id();
        let buyer_id = test_buyer_id();
        let listing_id = test_listing_id();
        let mut cart = cart_with_item(tenant_id, buyer_id, listing_id);

        let events = cart
            .handle(&CartCommand::ClearCart(ClearCart {
                tenant_id,
                cart_id: cart.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert_eq!(events.len(), 1);
        for event in &events {
            cart.apply(event);
        }
        assert!(cart.is_empty());

        // Clearing again is a no-op.
        let events = cart
            .handle(&CartCommand::ClearCart(ClearCart {
                tenant_id,
                cart_id: cart.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn subtotal_and_item_count_derive_from_lines() {
        let tenant_id = test_tenant_id();
        let buyer_id = test_buyer_id();
        let listing_a = test_listing_id();
        let listing_b = test_listing_id();
        let cart_id = CartId::for_buyer(buyer_id);
        let mut cart = Cart::empty(cart_id);

        let mut first = add_cmd(tenant_id, cart_id, buyer_id, listing_a);
        first.unit_price_cents = 1_000_000;
        for event in &cart.handle(&CartCommand::AddItem(first.clone())).unwrap() {
            cart.apply(event);
        }
        for event in &cart.handle(&CartCommand::AddItem(first)).unwrap() {
            cart.apply(event);
        }

        let mut second = add_cmd(tenant_id, cart_id, buyer_id, listing_b);
        second.unit_price_cents = 500_000;
        for event in &cart.handle(&CartCommand::AddItem(second)).unwrap() {
            cart.apply(event);
        }

        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.subtotal(), 2_500_000);
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let tenant_id = test_tenant_id();
        let buyer_id = test_buyer_id();
        let listing_id = test_listing_id();
        let cart = cart_with_item(tenant_id, buyer_id, listing_id);
        let before = cart.clone();

        let cmd = CartCommand::IncrementItem(IncrementItem {
            tenant_id,
            cart_id: cart.id_typed(),
            listing_id,
            available_stock: 3,
            occurred_at: test_time(),
        });
        let events1 = cart.handle(&cmd).unwrap();
        let events2 = cart.handle(&cmd).unwrap();

        assert_eq!(cart, before);
        assert_eq!(events1, events2);
    }
}
