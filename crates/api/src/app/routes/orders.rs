//! Order query and lifecycle routes.
//!
//! Orders are placed through `/cart/checkout`; everything here reads or
//! advances an existing order.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use motormart_auth::Permission;
use motormart_core::AggregateId;
use motormart_orders::{
    CancelOrder, ConfirmOrder, DeliverOrder, Order, OrderCommand, OrderId, RefundOrder,
    ShipOrder, StartProcessing,
};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders))
        .route("/mine", get(my_orders))
        .route("/sales", get(my_sales))
        .route("/:id", get(get_order))
        .route("/:id/confirm", post(confirm_order))
        .route("/:id/process", post(process_order))
        .route("/:id/ship", post(ship_order))
        .route("/:id/deliver", post(deliver_order))
        .route("/:id/cancel", post(cancel_order))
        .route("/:id/refund", post(refund_order))
}

fn parse_order_id(id: &str) -> Result<AggregateId, axum::response::Response> {
    id.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id"))
}

fn authorize(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    permission: &str,
) -> Result<(), axum::response::Response> {
    let cmd_auth = CmdAuth { inner: (), required: vec![Permission::new(permission.to_string())] };
    crate::authz::authorize_command(tenant, principal, &cmd_auth)
        .map_err(|e| errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authorize(&tenant, &principal, "orders.read") {
        return resp;
    }
    let items = services
        .orders_list(tenant.tenant_id())
        .into_iter()
        .map(dto::order_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn my_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authorize(&tenant, &principal, "orders.own.read") {
        return resp;
    }
    let items = services
        .orders_for_buyer(tenant.tenant_id(), principal.user_id())
        .into_iter()
        .map(dto::order_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// Orders containing at least one of the caller's listings.
pub async fn my_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authorize(&tenant, &principal, "orders.own.read") {
        return resp;
    }
    let items = services
        .orders_for_seller(tenant.tenant_id(), principal.user_id())
        .into_iter()
        .map(dto::order_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match parse_order_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(rm) = services.orders_get(tenant.tenant_id(), &OrderId::new(agg)) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found");
    };

    let is_staff =
        crate::authz::has_permission(&tenant, &principal, &Permission::new("orders.read"));
    let user_id = principal.user_id();
    let is_participant =
        rm.buyer_id == user_id || rm.lines.iter().any(|l| l.seller_id == user_id);

    if is_staff || is_participant {
        (StatusCode::OK, Json(dto::order_to_json(rm))).into_response()
    } else {
        // Existence of someone else's order is not disclosed.
        errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle transitions
// ─────────────────────────────────────────────────────────────────────────────

pub async fn confirm_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    staff_transition(&services, &tenant, &principal, &id, |order_id| {
        OrderCommand::ConfirmOrder(ConfirmOrder {
            tenant_id: tenant.tenant_id(),
            order_id,
            occurred_at: Utc::now(),
        })
    })
}

pub async fn process_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    staff_transition(&services, &tenant, &principal, &id, |order_id| {
        OrderCommand::StartProcessing(StartProcessing {
            tenant_id: tenant.tenant_id(),
            order_id,
            occurred_at: Utc::now(),
        })
    })
}

pub async fn ship_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    staff_transition(&services, &tenant, &principal, &id, |order_id| {
        OrderCommand::ShipOrder(ShipOrder {
            tenant_id: tenant.tenant_id(),
            order_id,
            occurred_at: Utc::now(),
        })
    })
}

pub async fn deliver_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    staff_transition(&services, &tenant, &principal, &id, |order_id| {
        OrderCommand::DeliverOrder(DeliverOrder {
            tenant_id: tenant.tenant_id(),
            order_id,
            occurred_at: Utc::now(),
        })
    })
}

pub async fn refund_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    staff_transition(&services, &tenant, &principal, &id, |order_id| {
        OrderCommand::RefundOrder(RefundOrder {
            tenant_id: tenant.tenant_id(),
            order_id,
            occurred_at: Utc::now(),
        })
    })
}

pub async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let either = [
        Permission::new("orders.update"),
        Permission::new("orders.own.cancel"),
    ];
    if let Err(e) = crate::authz::authorize_any(&tenant, &principal, &either) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let agg = match parse_order_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let is_staff =
        crate::authz::has_permission(&tenant, &principal, &Permission::new("orders.update"));
    let cmd = OrderCommand::CancelOrder(CancelOrder {
        tenant_id: tenant.tenant_id(),
        order_id: OrderId::new(agg),
        actor_id: principal.user_id(),
        actor_is_staff: is_staff,
        occurred_at: Utc::now(),
    });

    dispatch_and_notify(&services, &tenant, agg, cmd)
}

fn staff_transition(
    services: &Arc<AppServices>,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    id: &str,
    make_cmd: impl FnOnce(OrderId) -> OrderCommand,
) -> axum::response::Response {
    let cmd_auth = CmdAuth { inner: (), required: vec![Permission::new("orders.update")] };
    if let Err(e) = crate::authz::authorize_command(tenant, principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let agg = match parse_order_id(id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    dispatch_and_notify(services, tenant, agg, make_cmd(OrderId::new(agg)))
}

fn dispatch_and_notify(
    services: &Arc<AppServices>,
    tenant: &TenantContext,
    agg: AggregateId,
    cmd: OrderCommand,
) -> axum::response::Response {
    let committed = match services.dispatch::<Order>(
        tenant.tenant_id(),
        agg,
        "orders.order",
        cmd,
        |_t, aggregate_id| Order::empty(OrderId::new(aggregate_id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    // Status email is best-effort; the read model may lag the event we just
    // committed, so derive the new status from it only if already visible.
    if let Some(rm) = services.orders_get(tenant.tenant_id(), &OrderId::new(agg)) {
        if !rm.customer_email.is_empty() {
            let email = motormart_notify::templates::order_status_update(
                tenant.tenant_id(),
                &rm.customer_email,
                &rm.customer_name,
                &rm.order_id.to_string(),
                rm.status.as_str(),
            );
            if let Err(e) = services.email().send(&email) {
                tracing::warn!("order status email failed: {e}");
            }
        }
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}
