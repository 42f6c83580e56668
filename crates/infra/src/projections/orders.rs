//! Orders projection: per-tenant order read models plus dashboard rollups.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Datelike, Months, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use motormart_core::{AggregateId, TenantId, UserId};
use motormart_events::EventEnvelope;
use motormart_orders::{OrderEvent, OrderId, OrderLine, OrderStatus, PaymentMethod};

use crate::projections::cursor_store::{InMemoryCursorStore, ProjectionCursorStore};
use crate::read_model::TenantStore;

/// Queryable order read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReadModel {
    pub order_id: OrderId,
    pub buyer_id: UserId,
    pub customer_name: String,
    pub customer_email: String,
    pub delivery_address: String,
    pub payment_method: PaymentMethod,
    pub lines: Vec<OrderLine>,
    pub total_cents: u64,
    pub status: OrderStatus,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Revenue for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    pub year: i32,
    pub month: u32,
    pub revenue_cents: u64,
}

/// Staff dashboard rollup.
///
/// Revenue counts every order that is not cancelled or refunded. The monthly
/// series covers the trailing 12 calendar months, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_orders: u64,
    pub status_counts: Vec<(String, u64)>,
    pub revenue_cents: u64,
    pub monthly_revenue: Vec<MonthlyRevenue>,
    pub recent_orders: Vec<OrderReadModel>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error)]
pub enum OrdersProjectionError {
    #[error("failed to deserialize order event: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

#[derive(Debug)]
pub struct OrdersProjection<S, C = InMemoryCursorStore>
where
    S: TenantStore<OrderId, OrderReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<CursorKey, u64>>,
    cursor_store: Option<Arc<C>>,
    projection_name: String,
}

impl<S> OrdersProjection<S>
where
    S: TenantStore<OrderId, OrderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
            cursor_store: None,
            projection_name: "orders.orders".to_string(),
        }
    }

    pub fn with_persistent_cursors<C: ProjectionCursorStore + 'static>(
        self,
        cursor_store: Arc<C>,
        projection_name: impl Into<String>,
    ) -> OrdersProjection<S, C> {
        OrdersProjection {
            store: self.store,
            cursors: RwLock::new(HashMap::new()),
            cursor_store: Some(cursor_store),
            projection_name: projection_name.into(),
        }
    }
}

impl<S, C> OrdersProjection<S, C>
where
    S: TenantStore<OrderId, OrderReadModel>,
    C: ProjectionCursorStore + 'static,
{
    fn get_cursor(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        if let Some(ref cursor_store) = self.cursor_store {
            cursor_store
                .get_cursor(tenant_id, aggregate_id, &self.projection_name)
                .unwrap_or(0)
        } else {
            match self.cursors.read() {
                Ok(cursors) => *cursors
                    .get(&CursorKey {
                        tenant_id,
                        aggregate_id,
                    })
                    .unwrap_or(&0),
                Err(_) => 0,
            }
        }
    }

    fn update_cursor(&self, tenant_id: TenantId, aggregate_id: AggregateId, sequence_number: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(
                CursorKey {
                    tenant_id,
                    aggregate_id,
                },
                sequence_number,
            );
        }
        if let Some(ref cursor_store) = self.cursor_store {
            cursor_store.update_cursor(
                tenant_id,
                aggregate_id,
                &self.projection_name,
                sequence_number,
            );
        }
    }

    fn clear_cursors(&self, tenant_id: TenantId) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.retain(|k, _| k.tenant_id != tenant_id);
        }
        if let Some(ref cursor_store) = self.cursor_store {
            cursor_store.clear_cursors(tenant_id, &self.projection_name);
        }
    }

    pub fn get(&self, tenant_id: TenantId, order_id: &OrderId) -> Option<OrderReadModel> {
        self.store.get(tenant_id, order_id)
    }

    /// All orders for the tenant, newest first.
    pub fn list(&self, tenant_id: TenantId) -> Vec<OrderReadModel> {
        let mut orders = self.store.list(tenant_id);
        orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        orders
    }

    /// Orders placed by one buyer, newest first.
    pub fn list_for_buyer(&self, tenant_id: TenantId, buyer_id: UserId) -> Vec<OrderReadModel> {
        let mut orders: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|rm| rm.buyer_id == buyer_id)
            .collect();
        orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        orders
    }

    /// Orders containing at least one line sold by the given seller.
    pub fn list_for_seller(&self, tenant_id: TenantId, seller_id: UserId) -> Vec<OrderReadModel> {
        let mut orders: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|rm| rm.lines.iter().any(|line| line.seller_id == seller_id))
            .collect();
        orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        orders
    }

    /// Dashboard rollup as of `now`.
    pub fn dashboard(&self, tenant_id: TenantId, now: DateTime<Utc>) -> DashboardSummary {
        let orders = self.list(tenant_id);

        let mut status_counts: HashMap<&'static str, u64> = HashMap::new();
        let mut revenue_cents = 0u64;
        for order in &orders {
            *status_counts.entry(order.status.as_str()).or_default() += 1;
            if !matches!(order.status, OrderStatus::Cancelled | OrderStatus::Refunded) {
                revenue_cents = revenue_cents.saturating_add(order.total_cents);
            }
        }
        let mut status_counts: Vec<(String, u64)> = status_counts
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        status_counts.sort();

        let monthly_revenue =
            trailing_monthly_revenue(orders.iter().map(|o| (o, o.total_cents)), now);
        let recent_orders = orders.iter().take(5).cloned().collect();

        DashboardSummary {
            total_orders: orders.len() as u64,
            status_counts,
            revenue_cents,
            monthly_revenue,
            recent_orders,
        }
    }

    /// Dashboard rollup restricted to one seller's sales.
    ///
    /// Covers the orders carrying at least one of the seller's lines;
    /// revenue counts only the seller's own lines within them.
    pub fn dashboard_for_seller(
        &self,
        tenant_id: TenantId,
        seller_id: UserId,
        now: DateTime<Utc>,
    ) -> DashboardSummary {
        let orders = self.list_for_seller(tenant_id, seller_id);

        let mut status_counts: HashMap<&'static str, u64> = HashMap::new();
        let mut revenue_cents = 0u64;
        for order in &orders {
            *status_counts.entry(order.status.as_str()).or_default() += 1;
            if !matches!(order.status, OrderStatus::Cancelled | OrderStatus::Refunded) {
                revenue_cents = revenue_cents.saturating_add(seller_subtotal(order, seller_id));
            }
        }
        let mut status_counts: Vec<(String, u64)> = status_counts
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        status_counts.sort();

        let monthly_revenue = trailing_monthly_revenue(
            orders.iter().map(|o| (o, seller_subtotal(o, seller_id))),
            now,
        );
        let recent_orders = orders.iter().take(5).cloned().collect();

        DashboardSummary {
            total_orders: orders.len() as u64,
            status_counts,
            revenue_cents,
            monthly_revenue,
            recent_orders,
        }
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), OrdersProjectionError> {
        if envelope.aggregate_type() != "orders.order" {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.get_cursor(tenant_id, aggregate_id);
        if seq == 0 {
            return Err(OrdersProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 && last != 0 {
            return Err(OrdersProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: OrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| OrdersProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, order_id) = match &ev {
            OrderEvent::OrderPlaced(e) => (e.tenant_id, e.order_id),
            OrderEvent::OrderConfirmed(e) => (e.tenant_id, e.order_id),
            OrderEvent::OrderProcessingStarted(e) => (e.tenant_id, e.order_id),
            OrderEvent::OrderShipped(e) => (e.tenant_id, e.order_id),
            OrderEvent::OrderDelivered(e) => (e.tenant_id, e.order_id),
            OrderEvent::OrderCancelled(e) => (e.tenant_id, e.order_id),
            OrderEvent::OrderRefunded(e) => (e.tenant_id, e.order_id),
        };

        if event_tenant != tenant_id {
            return Err(OrdersProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if order_id.0 != aggregate_id {
            return Err(OrdersProjectionError::TenantIsolation(
                "event order_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            OrderEvent::OrderPlaced(e) => {
                self.store.upsert(
                    tenant_id,
                    e.order_id,
                    OrderReadModel {
                        order_id: e.order_id,
                        buyer_id: e.buyer_id,
                        customer_name: e.customer_name,
                        customer_email: e.customer_email,
                        delivery_address: e.delivery_address,
                        payment_method: e.payment_method,
                        lines: e.lines,
                        total_cents: e.total_cents,
                        status: OrderStatus::Pending,
                        placed_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            OrderEvent::OrderConfirmed(e) => {
                self.set_status(tenant_id, e.order_id, OrderStatus::Confirmed, e.occurred_at);
            }
            OrderEvent::OrderProcessingStarted(e) => {
                self.set_status(tenant_id, e.order_id, OrderStatus::Processing, e.occurred_at);
            }
            OrderEvent::OrderShipped(e) => {
                self.set_status(tenant_id, e.order_id, OrderStatus::Shipped, e.occurred_at);
            }
            OrderEvent::OrderDelivered(e) => {
                self.set_status(tenant_id, e.order_id, OrderStatus::Delivered, e.occurred_at);
            }
            OrderEvent::OrderCancelled(e) => {
                self.set_status(tenant_id, e.order_id, OrderStatus::Cancelled, e.occurred_at);
            }
            OrderEvent::OrderRefunded(e) => {
                self.set_status(tenant_id, e.order_id, OrderStatus::Refunded, e.occurred_at);
            }
        }

        self.update_cursor(tenant_id, aggregate_id, seq);
        Ok(())
    }

    fn set_status(
        &self,
        tenant_id: TenantId,
        order_id: OrderId,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) {
        if let Some(mut rm) = self.store.get(tenant_id, &order_id) {
            rm.status = status;
            rm.updated_at = at;
            self.store.upsert(tenant_id, order_id, rm);
        }
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), OrdersProjectionError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();

        {
            let mut tenants = envs.iter().map(|e| e.tenant_id()).collect::<Vec<_>>();
            tenants.sort_by_key(|t| *t.as_uuid().as_bytes());
            tenants.dedup();
            for t in tenants {
                self.store.clear_tenant(t);
                self.clear_cursors(t);
            }
        }

        envs.sort_by_key(|e| {
            (
                *e.tenant_id().as_uuid().as_bytes(),
                *e.aggregate_id().as_uuid().as_bytes(),
                e.sequence_number(),
            )
        });

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}

/// Sum of one seller's line amounts within an order.
fn seller_subtotal(order: &OrderReadModel, seller_id: UserId) -> u64 {
    order
        .lines
        .iter()
        .filter(|line| line.seller_id == seller_id)
        .fold(0u64, |acc, line| {
            acc.saturating_add(line.unit_price_cents.saturating_mul(line.quantity as u64))
        })
}

/// Trailing 12 calendar months of revenue, oldest month first.
///
/// Each entry pairs an order with the amount it contributes (the full
/// total for staff, the seller's own subtotal for seller views). Orders
/// land in the month they were placed; cancelled and refunded orders
/// contribute nothing.
fn trailing_monthly_revenue<'a>(
    entries: impl IntoIterator<Item = (&'a OrderReadModel, u64)>,
    now: DateTime<Utc>,
) -> Vec<MonthlyRevenue> {
    let mut months: Vec<MonthlyRevenue> = Vec::with_capacity(12);
    for offset in (0..12).rev() {
        let month_start = now
            .checked_sub_months(Months::new(offset))
            .unwrap_or(now);
        months.push(MonthlyRevenue {
            year: month_start.year(),
            month: month_start.month(),
            revenue_cents: 0,
        });
    }

    for (order, amount) in entries {
        if matches!(order.status, OrderStatus::Cancelled | OrderStatus::Refunded) {
            continue;
        }
        let (y, m) = (order.placed_at.year(), order.placed_at.month());
        if let Some(bucket) = months.iter_mut().find(|b| b.year == y && b.month == m) {
            bucket.revenue_cents = bucket.revenue_cents.saturating_add(amount);
        }
    }

    months
}
