use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use motormart_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use motormart_events::Event;
use motormart_listings::ListingId;

/// Order identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Order status lifecycle.
///
/// Fixed forward path `pending → confirmed → processing → shipped →
/// delivered` with `cancelled` and `refunded` as exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Badge color used by API clients when rendering this status.
    pub fn status_color(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "warning",
            OrderStatus::Confirmed => "info",
            OrderStatus::Processing => "primary",
            OrderStatus::Shipped => "success",
            OrderStatus::Delivered => "success",
            OrderStatus::Cancelled => "danger",
            OrderStatus::Refunded => "secondary",
        }
    }

    /// Buyers may back out only before fulfilment starts.
    pub fn can_be_cancelled(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Staff may keep working the order until it reaches a terminal state.
    pub fn can_be_updated(&self) -> bool {
        !matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the buyer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    CashOnDelivery,
}

/// One purchased listing within an order.
///
/// Name and unit price are snapshots taken at checkout; later listing edits
/// do not rewrite history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub listing_id: ListingId,
    pub listing_name: String,
    pub quantity: u32,
    pub unit_price_cents: u64,
    pub seller_id: UserId,
}

impl OrderLine {
    pub fn line_total_cents(&self) -> Option<u64> {
        u64::from(self.quantity).checked_mul(self.unit_price_cents)
    }
}

fn lines_total_cents(lines: &[OrderLine]) -> Option<u64> {
    lines
        .iter()
        .try_fold(0u64, |acc, line| acc.checked_add(line.line_total_cents()?))
}

/// Aggregate root: a buyer's order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    tenant_id: Option<TenantId>,
    buyer_id: Option<UserId>,
    customer_name: String,
    customer_email: String,
    delivery_address: String,
    payment_method: PaymentMethod,
    lines: Vec<OrderLine>,
    total_cents: u64,
    status: OrderStatus,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            buyer_id: None,
            customer_name: String::new(),
            customer_email: String::new(),
            delivery_address: String::new(),
            payment_method: PaymentMethod::Card,
            lines: Vec::new(),
            total_cents: 0,
            status: OrderStatus::Pending,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn buyer_id(&self) -> Option<UserId> {
        self.buyer_id
    }

    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    pub fn customer_email(&self) -> &str {
        &self.customer_email
    }

    pub fn delivery_address(&self) -> &str {
        &self.delivery_address
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total_cents(&self) -> u64 {
        self.total_cents
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

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

/// Command: PlaceOrder. Starts `pending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub buyer_id: UserId,
    pub customer_name: String,
    pub customer_email: String,
    pub delivery_address: String,
    pub payment_method: PaymentMethod,
    pub lines: Vec<OrderLine>,
    pub total_cents: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmOrder (pending → confirmed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmOrder {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartProcessing (confirmed → processing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartProcessing {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ShipOrder (processing → shipped).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipOrder {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeliverOrder (shipped → delivered).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverOrder {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder.
///
/// Buyers cancel their own order while `can_be_cancelled()`; staff cancel any
/// order while `can_be_updated()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub actor_id: UserId,
    pub actor_is_staff: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RefundOrder (staff; confirmed/processing/shipped/delivered).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundOrder {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    ConfirmOrder(ConfirmOrder),
    StartProcessing(StartProcessing),
    ShipOrder(ShipOrder),
    DeliverOrder(DeliverOrder),
    CancelOrder(CancelOrder),
    RefundOrder(RefundOrder),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub buyer_id: UserId,
    pub customer_name: String,
    pub customer_email: String,
    pub delivery_address: String,
    pub payment_method: PaymentMethod,
    pub lines: Vec<OrderLine>,
    pub total_cents: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmed {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderProcessingStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderProcessingStarted {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderShipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderShipped {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderDelivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDelivered {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub cancelled_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderRefunded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRefunded {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    OrderConfirmed(OrderConfirmed),
    OrderProcessingStarted(OrderProcessingStarted),
    OrderShipped(OrderShipped),
    OrderDelivered(OrderDelivered),
    OrderCancelled(OrderCancelled),
    OrderRefunded(OrderRefunded),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "orders.order.placed",
            OrderEvent::OrderConfirmed(_) => "orders.order.confirmed",
            OrderEvent::OrderProcessingStarted(_) => "orders.order.processing_started",
            OrderEvent::OrderShipped(_) => "orders.order.shipped",
            OrderEvent::OrderDelivered(_) => "orders.order.delivered",
            OrderEvent::OrderCancelled(_) => "orders.order.cancelled",
            OrderEvent::OrderRefunded(_) => "orders.order.refunded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::OrderConfirmed(e) => e.occurred_at,
            OrderEvent::OrderProcessingStarted(e) => e.occurred_at,
            OrderEvent::OrderShipped(e) => e.occurred_at,
            OrderEvent::OrderDelivered(e) => e.occurred_at,
            OrderEvent::OrderCancelled(e) => e.occurred_at,
            OrderEvent::OrderRefunded(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.buyer_id = Some(e.buyer_id);
                self.customer_name = e.customer_name.clone();
                self.customer_email = e.customer_email.clone();
                self.delivery_address = e.delivery_address.clone();
                self.payment_method = e.payment_method;
                self.lines = e.lines.clone();
                self.total_cents = e.total_cents;
                self.status = OrderStatus::Pending;
                self.created = true;
            }
            OrderEvent::OrderConfirmed(_) => {
                self.status = OrderStatus::Confirmed;
            }
            OrderEvent::OrderProcessingStarted(_) => {
                self.status = OrderStatus::Processing;
            }
            OrderEvent::OrderShipped(_) => {
                self.status = OrderStatus::Shipped;
            }
            OrderEvent::OrderDelivered(_) => {
                self.status = OrderStatus::Delivered;
            }
            OrderEvent::OrderCancelled(_) => {
                self.status = OrderStatus::Cancelled;
            }
            OrderEvent::OrderRefunded(_) => {
                self.status = OrderStatus::Refunded;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::ConfirmOrder(cmd) => self.handle_confirm(cmd),
            OrderCommand::StartProcessing(cmd) => self.handle_start_processing(cmd),
            OrderCommand::ShipOrder(cmd) => self.handle_ship(cmd),
            OrderCommand::DeliverOrder(cmd) => self.handle_deliver(cmd),
            OrderCommand::CancelOrder(cmd) => self.handle_cancel(cmd),
            OrderCommand::RefundOrder(cmd) => self.handle_refund(cmd),
        }
    }
}

impl Order {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_order_id(&self, order_id: OrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_status(&self, expected: OrderStatus, action: &str) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::invariant(format!(
                "cannot {} order in status '{}'",
                action, self.status
            )));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }

        if cmd.customer_name.trim().is_empty() {
            return Err(DomainError::validation("customer name cannot be empty"));
        }
        if cmd.customer_email.trim().is_empty() || !cmd.customer_email.contains('@') {
            return Err(DomainError::validation("invalid customer email"));
        }
        if cmd.delivery_address.trim().is_empty() {
            return Err(DomainError::validation("delivery address cannot be empty"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("order must contain at least one line"));
        }
        for line in &cmd.lines {
            if line.quantity == 0 {
                return Err(DomainError::validation("line quantity must be at least 1"));
            }
            if line.unit_price_cents == 0 {
                return Err(DomainError::validation("line unit price must be greater than zero"));
            }
            if line.listing_name.trim().is_empty() {
                return Err(DomainError::validation("line listing name cannot be empty"));
            }
        }

        let computed = lines_total_cents(&cmd.lines)
            .ok_or_else(|| DomainError::validation("order total overflows"))?;
        if computed != cmd.total_cents {
            return Err(DomainError::validation("order total does not match line sum"));
        }

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            buyer_id: cmd.buyer_id,
            customer_name: cmd.customer_name.trim().to_string(),
            customer_email: cmd.customer_email.trim().to_lowercase(),
            delivery_address: cmd.delivery_address.trim().to_string(),
            payment_method: cmd.payment_method,
            lines: cmd.lines.clone(),
            total_cents: cmd.total_cents,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_status(OrderStatus::Pending, "confirm")?;

        Ok(vec![OrderEvent::OrderConfirmed(OrderConfirmed {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start_processing(
        &self,
        cmd: &StartProcessing,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_status(OrderStatus::Confirmed, "start processing")?;

        Ok(vec![OrderEvent::OrderProcessingStarted(
            OrderProcessingStarted {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_ship(&self, cmd: &ShipOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_status(OrderStatus::Processing, "ship")?;

        Ok(vec![OrderEvent::OrderShipped(OrderShipped {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deliver(&self, cmd: &DeliverOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_status(OrderStatus::Shipped, "deliver")?;

        Ok(vec![OrderEvent::OrderDelivered(OrderDelivered {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.order_id)?;

        if cmd.actor_is_staff {
            if !self.status.can_be_updated() {
                return Err(DomainError::invariant(format!(
                    "cannot cancel order in status '{}'",
                    self.status
                )));
            }
        } else {
            if self.buyer_id != Some(cmd.actor_id) {
                return Err(DomainError::Unauthorized);
            }
            if !self.status.can_be_cancelled() {
                return Err(DomainError::invariant(format!(
                    "order in status '{}' can no longer be cancelled",
                    self.status
                )));
            }
        }

        Ok(vec![OrderEvent::OrderCancelled(OrderCancelled {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            cancelled_by: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_refund(&self, cmd: &RefundOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.order_id)?;

        if !matches!(
            self.status,
            OrderStatus::Confirmed
                | OrderStatus::Processing
                | OrderStatus::Shipped
                | OrderStatus::Delivered
        ) {
            return Err(DomainError::invariant(format!(
                "cannot refund order in status '{}'",
                self.status
            )));
        }

        Ok(vec![OrderEvent::OrderRefunded(OrderRefunded {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
