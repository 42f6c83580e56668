//! Per-buyer wishlist routes. Save/unsave are idempotent.

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
use motormart_listings::ListingId;
use motormart_shopping::{
    SaveListing, UnsaveListing, Wishlist, WishlistCommand, WishlistId,
};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_wishlist))
        .route("/:listing_id", post(save_listing).delete(unsave_listing))
}

fn authorize_wishlist(
    tenant: &TenantContext,
    principal: &PrincipalContext,
) -> Result<(), axum::response::Response> {
    let cmd_auth = CmdAuth { inner: (), required: vec![Permission::new("wishlist.write")] };
    crate::authz::authorize_command(tenant, principal, &cmd_auth)
        .map_err(|e| errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}

fn parse_listing_id(id: &str) -> Result<ListingId, axum::response::Response> {
    id.parse::<AggregateId>().map(ListingId::new).map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid listing id")
    })
}

pub async fn get_wishlist(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authorize_wishlist(&tenant, &principal) {
        return resp;
    }
    match services.wishlist_for_buyer(tenant.tenant_id(), principal.user_id()) {
        Some(rm) => (StatusCode::OK, Json(dto::wishlist_to_json(rm))).into_response(),
        None => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": WishlistId::for_buyer(principal.user_id()).to_string(),
                "buyer_id": principal.user_id().to_string(),
                "listings": [],
            })),
        )
            .into_response(),
    }
}

pub async fn save_listing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(listing_id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authorize_wishlist(&tenant, &principal) {
        return resp;
    }
    let listing_id = match parse_listing_id(&listing_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    // Only listings that exist in this tenant can be saved.
    if services.catalog_get(tenant.tenant_id(), &listing_id).is_none() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "listing not found");
    }

    let buyer_id = principal.user_id();
    let wishlist_id = WishlistId::for_buyer(buyer_id);
    let cmd = WishlistCommand::SaveListing(SaveListing {
        tenant_id: tenant.tenant_id(),
        wishlist_id,
        buyer_id,
        listing_id,
        occurred_at: Utc::now(),
    });

    dispatch_wishlist(&services, &tenant, wishlist_id, cmd)
}

pub async fn unsave_listing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(listing_id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authorize_wishlist(&tenant, &principal) {
        return resp;
    }
    let listing_id = match parse_listing_id(&listing_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let wishlist_id = WishlistId::for_buyer(principal.user_id());
    let cmd = WishlistCommand::UnsaveListing(UnsaveListing {
        tenant_id: tenant.tenant_id(),
        wishlist_id,
        listing_id,
        occurred_at: Utc::now(),
    });

    dispatch_wishlist(&services, &tenant, wishlist_id, cmd)
}

fn dispatch_wishlist(
    services: &Arc<AppServices>,
    tenant: &TenantContext,
    wishlist_id: WishlistId,
    cmd: WishlistCommand,
) -> axum::response::Response {
    match services.dispatch::<Wishlist>(
        tenant.tenant_id(),
        wishlist_id.0,
        "shopping.wishlist",
        cmd,
        |_t, aggregate_id| Wishlist::empty(WishlistId::new(aggregate_id)),
    ) {
        Ok(committed) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": wishlist_id.to_string(),
                "events_committed": committed.len(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
