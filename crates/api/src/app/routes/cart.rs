//! Per-buyer cart routes plus the checkout orchestration.
//!
//! Checkout is the one place where several aggregates meet: it re-validates
//! the cart against the live catalog, charges (for card payments), decrements
//! stock per line, places the order, and finally clears the cart. Stock
//! decrements that already happened are compensated if a later line fails.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;

use motormart_auth::Permission;
use motormart_core::AggregateId;
use motormart_listings::{AdjustStock, Listing, ListingCommand, ListingId};
use motormart_orders::{Order, OrderCommand, OrderId, OrderLine, PaymentMethod, PlaceOrder};
use motormart_payments::{PaymentError, MAX_CHARGE_CENTS};
use motormart_shopping::{
    AddItem, Cart, CartCommand, CartId, ClearCart, DecrementItem, IncrementItem, RemoveItem,
    SetItemQuantity,
};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/:listing_id", delete(remove_item).put(set_quantity))
        .route("/items/:listing_id/increment", post(increment_item))
        .route("/items/:listing_id/decrement", post(decrement_item))
        .route("/checkout", post(checkout))
}

fn cart_permission() -> Permission {
    Permission::new("cart.write")
}

fn parse_listing_id(id: &str) -> Result<ListingId, axum::response::Response> {
    id.parse::<AggregateId>().map(ListingId::new).map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid listing id")
    })
}

fn authorize_cart(
    tenant: &TenantContext,
    principal: &PrincipalContext,
) -> Result<(), axum::response::Response> {
    let cmd_auth = CmdAuth { inner: (), required: vec![cart_permission()] };
    crate::authz::authorize_command(tenant, principal, &cmd_auth)
        .map_err(|e| errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}

fn dispatch_cart(
    services: &Arc<AppServices>,
    tenant: &TenantContext,
    cart_id: CartId,
    cmd: CartCommand,
) -> axum::response::Response {
    match services.dispatch::<Cart>(
        tenant.tenant_id(),
        cart_id.0,
        "shopping.cart",
        cmd,
        |_t, aggregate_id| Cart::empty(CartId::new(aggregate_id)),
    ) {
        Ok(committed) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": cart_id.to_string(),
                "events_committed": committed.len(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authorize_cart(&tenant, &principal) {
        return resp;
    }
    match services.cart_for_buyer(tenant.tenant_id(), principal.user_id()) {
        Some(rm) => (StatusCode::OK, Json(dto::cart_to_json(rm))).into_response(),
        // A buyer who never added anything still has an (empty) cart.
        None => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": CartId::for_buyer(principal.user_id()).to_string(),
                "buyer_id": principal.user_id().to_string(),
                "items": [],
                "subtotal_cents": 0,
                "item_count": 0,
            })),
        )
            .into_response(),
    }
}

pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::AddCartItemRequest>,
) -> axum::response::Response {
    if let Err(resp) = authorize_cart(&tenant, &principal) {
        return resp;
    }
    let listing_id = match parse_listing_id(&body.listing_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    // Snapshot name/price from the live catalog; only on-market listings can
    // be added.
    let listing = match services.catalog_get(tenant.tenant_id(), &listing_id) {
        Some(rm) if rm.is_on_market() => rm,
        _ => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "listing not found"),
    };

    let buyer_id = principal.user_id();
    let cart_id = CartId::for_buyer(buyer_id);
    let cmd = CartCommand::AddItem(AddItem {
        tenant_id: tenant.tenant_id(),
        cart_id,
        buyer_id,
        listing_id,
        listing_name: listing.title,
        unit_price_cents: listing.price_cents,
        available_stock: listing.stock,
        occurred_at: Utc::now(),
    });

    dispatch_cart(&services, &tenant, cart_id, cmd)
}

pub async fn increment_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(listing_id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authorize_cart(&tenant, &principal) {
        return resp;
    }
    let listing_id = match parse_listing_id(&listing_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let available_stock = services
        .catalog_get(tenant.tenant_id(), &listing_id)
        .map(|rm| rm.stock)
        .unwrap_or(0);

    let cart_id = CartId::for_buyer(principal.user_id());
    let cmd = CartCommand::IncrementItem(IncrementItem {
        tenant_id: tenant.tenant_id(),
        cart_id,
        listing_id,
        available_stock,
        occurred_at: Utc::now(),
    });

    dispatch_cart(&services, &tenant, cart_id, cmd)
}

pub async fn decrement_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(listing_id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authorize_cart(&tenant, &principal) {
        return resp;
    }
    let listing_id = match parse_listing_id(&listing_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cart_id = CartId::for_buyer(principal.user_id());
    let cmd = CartCommand::DecrementItem(DecrementItem {
        tenant_id: tenant.tenant_id(),
        cart_id,
        listing_id,
        occurred_at: Utc::now(),
    });

    dispatch_cart(&services, &tenant, cart_id, cmd)
}

pub async fn set_quantity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(listing_id): Path<String>,
    Json(body): Json<dto::SetCartQuantityRequest>,
) -> axum::response::Response {
    if let Err(resp) = authorize_cart(&tenant, &principal) {
        return resp;
    }
    let listing_id = match parse_listing_id(&listing_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let available_stock = services
        .catalog_get(tenant.tenant_id(), &listing_id)
        .map(|rm| rm.stock)
        .unwrap_or(0);

    let cart_id = CartId::for_buyer(principal.user_id());
    let cmd = CartCommand::SetItemQuantity(SetItemQuantity {
        tenant_id: tenant.tenant_id(),
        cart_id,
        listing_id,
        quantity: body.quantity,
        available_stock,
        occurred_at: Utc::now(),
    });

    dispatch_cart(&services, &tenant, cart_id, cmd)
}

pub async fn remove_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(listing_id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authorize_cart(&tenant, &principal) {
        return resp;
    }
    let listing_id = match parse_listing_id(&listing_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cart_id = CartId::for_buyer(principal.user_id());
    let cmd = CartCommand::RemoveItem(RemoveItem {
        tenant_id: tenant.tenant_id(),
        cart_id,
        listing_id,
        occurred_at: Utc::now(),
    });

    dispatch_cart(&services, &tenant, cart_id, cmd)
}

pub async fn clear_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authorize_cart(&tenant, &principal) {
        return resp;
    }

    let cart_id = CartId::for_buyer(principal.user_id());
    let cmd = CartCommand::ClearCart(ClearCart {
        tenant_id: tenant.tenant_id(),
        cart_id,
        occurred_at: Utc::now(),
    });

    dispatch_cart(&services, &tenant, cart_id, cmd)
}

// ─────────────────────────────────────────────────────────────────────────────
// Checkout
// ─────────────────────────────────────────────────────────────────────────────

pub async fn checkout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CheckoutRequest>,
) -> axum::response::Response {
    let cmd_auth = CmdAuth { inner: (), required: vec![Permission::new("checkout.write")] };
    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let payment_method = match errors::parse_payment_method(&body.payment_method) {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    let tenant_id = tenant.tenant_id();
    let buyer_id = principal.user_id();

    let cart = match services.cart_for_buyer(tenant_id, buyer_id) {
        Some(c) if !c.items.is_empty() => c,
        _ => return errors::json_error(StatusCode::BAD_REQUEST, "empty_cart", "cart is empty"),
    };

    // Re-validate every line against the live catalog before touching stock.
    let mut lines = Vec::with_capacity(cart.items.len());
    for item in &cart.items {
        let listing = match services.catalog_get(tenant_id, &item.listing_id) {
            Some(rm) if rm.is_on_market() => rm,
            _ => {
                return errors::json_error(
                    StatusCode::CONFLICT,
                    "listing_unavailable",
                    format!("\"{}\" is no longer available", item.listing_name),
                )
            }
        };
        if listing.stock < item.quantity {
            return errors::json_error(
                StatusCode::CONFLICT,
                "insufficient_stock",
                format!(
                    "only {} of \"{}\" left in stock",
                    listing.stock, item.listing_name
                ),
            );
        }
        lines.push(OrderLine {
            listing_id: item.listing_id,
            listing_name: item.listing_name.clone(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price_cents,
            seller_id: listing.seller_id,
        });
    }

    let total_cents = cart.subtotal_cents();

    // Card charges are capped by the gateway; larger totals need an offline
    // payment method.
    if payment_method == PaymentMethod::Card && total_cents > MAX_CHARGE_CENTS {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "charge_limit_exceeded",
            "order total exceeds the card charge limit; use bank_transfer or cash_on_delivery",
        );
    }

    if payment_method == PaymentMethod::Card {
        let intent = match services.payments().create_intent(tenant_id, total_cents) {
            Ok(i) => i,
            Err(e) => return payment_error_to_response(e),
        };
        if let Err(e) = services.payments().confirm(intent.intent_id) {
            return payment_error_to_response(e);
        }
    }

    let profile = services.users_get(tenant_id, &buyer_id);

    let customer_name = body
        .customer_name
        .or_else(|| profile.as_ref().map(|p| p.display_name.clone()))
        .unwrap_or_default();
    let customer_email = body
        .customer_email
        .or_else(|| profile.as_ref().map(|p| p.email.clone()))
        .unwrap_or_default();
    let delivery_address = match body
        .delivery_address
        .or_else(|| profile.as_ref().and_then(|p| p.address.clone()))
    {
        Some(a) if !a.trim().is_empty() => a,
        _ => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "missing_delivery_address",
                "delivery_address is required (none on profile either)",
            )
        }
    };

    // Decrement stock per line, compensating on failure so a half-finished
    // checkout never strands inventory.
    let mut decremented: Vec<(ListingId, u32)> = Vec::new();
    for line in &lines {
        let result = adjust_listing_stock(
            &services,
            tenant_id,
            buyer_id,
            line.listing_id,
            -(line.quantity as i64),
        );
        match result {
            Ok(()) => decremented.push((line.listing_id, line.quantity)),
            Err(e) => {
                compensate_stock(&services, tenant_id, buyer_id, &decremented);
                return errors::dispatch_error_to_response(e);
            }
        }
    }

    let agg = AggregateId::new();
    let order_id = OrderId::new(agg);
    let cmd = OrderCommand::PlaceOrder(PlaceOrder {
        tenant_id,
        order_id,
        buyer_id,
        customer_name: customer_name.clone(),
        customer_email: customer_email.clone(),
        delivery_address,
        payment_method,
        lines: lines.clone(),
        total_cents,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<Order>(
        tenant_id,
        agg,
        "orders.order",
        cmd,
        |_t, aggregate_id| Order::empty(OrderId::new(aggregate_id)),
    ) {
        compensate_stock(&services, tenant_id, buyer_id, &decremented);
        return errors::dispatch_error_to_response(e);
    }

    let cart_id = CartId::for_buyer(buyer_id);
    let clear = CartCommand::ClearCart(ClearCart {
        tenant_id,
        cart_id,
        occurred_at: Utc::now(),
    });
    if let Err(e) = services.dispatch::<Cart>(
        tenant_id,
        cart_id.0,
        "shopping.cart",
        clear,
        |_t, aggregate_id| Cart::empty(CartId::new(aggregate_id)),
    ) {
        // The order is placed; a stale cart is an annoyance, not a failure.
        tracing::warn!("cart clear after checkout failed: {e:?}");
    }

    send_checkout_emails(
        &services,
        tenant_id,
        &customer_email,
        &customer_name,
        &order_id.to_string(),
        total_cents,
        &lines,
    );

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "total_cents": total_cents,
            "status": "pending",
        })),
    )
        .into_response()
}

fn adjust_listing_stock(
    services: &Arc<AppServices>,
    tenant_id: motormart_core::TenantId,
    buyer_id: motormart_core::UserId,
    listing_id: ListingId,
    delta: i64,
) -> Result<(), motormart_infra::command_dispatcher::DispatchError> {
    // Checkout adjusts stock on the system's authority, not the buyer's.
    let cmd = ListingCommand::AdjustStock(AdjustStock {
        tenant_id,
        listing_id,
        actor_id: buyer_id,
        actor_is_staff: true,
        delta,
        occurred_at: Utc::now(),
    });
    services
        .dispatch::<Listing>(
            tenant_id,
            listing_id.0,
            "listings.listing",
            cmd,
            |_t, aggregate_id| Listing::empty(ListingId::new(aggregate_id)),
        )
        .map(|_| ())
}

fn compensate_stock(
    services: &Arc<AppServices>,
    tenant_id: motormart_core::TenantId,
    buyer_id: motormart_core::UserId,
    decremented: &[(ListingId, u32)],
) {
    for (listing_id, quantity) in decremented {
        if let Err(e) =
            adjust_listing_stock(services, tenant_id, buyer_id, *listing_id, *quantity as i64)
        {
            tracing::error!("stock compensation failed for listing {listing_id}: {e:?}");
        }
    }
}

/// Best-effort notifications: the order stands even if mail fails.
fn send_checkout_emails(
    services: &Arc<AppServices>,
    tenant_id: motormart_core::TenantId,
    customer_email: &str,
    customer_name: &str,
    order_id: &str,
    total_cents: u64,
    lines: &[OrderLine],
) {
    if !customer_email.is_empty() {
        let email = motormart_notify::templates::order_confirmation(
            tenant_id,
            customer_email,
            customer_name,
            order_id,
            total_cents,
        );
        if let Err(e) = services.email().send(&email) {
            tracing::warn!("order confirmation email failed: {e}");
        }
    }

    // One notification per seller, even when the order holds several of
    // their listings.
    let mut notified = std::collections::HashSet::new();
    for line in lines {
        if !notified.insert(line.seller_id) {
            continue;
        }
        let Some(seller) = services.users_get(tenant_id, &line.seller_id) else {
            continue;
        };
        let email = motormart_notify::templates::car_sold(
            tenant_id,
            &seller.email,
            &seller.display_name,
            &line.listing_name,
            line.quantity,
        );
        if let Err(e) = services.email().send(&email) {
            tracing::warn!("seller sale email failed: {e}");
        }
    }
}

fn payment_error_to_response(err: PaymentError) -> axum::response::Response {
    match err {
        PaymentError::AmountTooLarge => errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "charge_limit_exceeded",
            err.to_string(),
        ),
        PaymentError::ZeroAmount => {
            errors::json_error(StatusCode::BAD_REQUEST, "invalid_amount", err.to_string())
        }
        PaymentError::UnknownIntent(_) | PaymentError::Gateway(_) => {
            errors::json_error(StatusCode::BAD_GATEWAY, "payment_failed", err.to_string())
        }
    }
}
