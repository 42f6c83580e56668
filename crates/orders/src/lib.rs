//! Orders domain module (event-sourced).
//!
//! Business rules for buyer orders and their status lifecycle, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod order;

pub use order::{
    CancelOrder, ConfirmOrder, DeliverOrder, Order, OrderCancelled, OrderCommand, OrderConfirmed,
    OrderDelivered, OrderEvent, OrderId, OrderLine, OrderPlaced, OrderProcessingStarted,
    OrderRefunded, OrderShipped, OrderStatus, PaymentMethod, PlaceOrder, RefundOrder, ShipOrder,
    StartProcessing,
};
