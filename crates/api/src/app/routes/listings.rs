//! Catalog browsing and listing management routes.
//!
//! `/catalog` is the storefront view (approved, in-stock listings only);
//! `/listings` is the seller/staff side of the same aggregate.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;

use motormart_auth::Permission;
use motormart_core::AggregateId;
use motormart_infra::projections::default_role_permissions;
use motormart_infra::projections::listings::{CatalogFilter, CatalogSort};
use motormart_listings::{
    AdjustStock, ApproveListing, ArchiveListing, CreateListing, Listing, ListingCommand,
    ListingId, RejectListing, SetPrice, UpdateListing,
};

use crate::app::routes::common::CmdAuth;
use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

/// Storefront routes (read-only).
pub fn catalog_router() -> Router {
    Router::new()
        .route("/", get(browse_catalog))
        .route("/categories", get(list_categories))
        .route("/brands", get(list_brands))
        .route("/:id", get(get_catalog_listing))
}

/// Seller/staff listing management routes.
pub fn router() -> Router {
    Router::new()
        .route("/", post(create_listing))
        .route("/mine", get(my_listings))
        .route("/pending", get(pending_listings))
        .route("/:id", get(get_listing).put(update_listing))
        .route("/:id/price", put(set_price))
        .route("/:id/stock", post(adjust_stock))
        .route("/:id/approve", post(approve_listing))
        .route("/:id/reject", post(reject_listing))
        .route("/:id/archive", post(archive_listing))
}

fn read_permissions() -> [Permission; 2] {
    [Permission::new("catalog.read"), Permission::new("listings.read")]
}

fn write_permissions() -> [Permission; 2] {
    [Permission::new("listings.write"), Permission::new("listings.own.write")]
}

fn is_staff(tenant: &TenantContext, principal: &PrincipalContext) -> bool {
    crate::authz::has_permission(tenant, principal, &Permission::new("listings.write"))
}

fn parse_sort(s: Option<&str>) -> Result<CatalogSort, axum::response::Response> {
    match s {
        None | Some("newest") => Ok(CatalogSort::Newest),
        Some("price_asc") => Ok(CatalogSort::PriceAsc),
        Some("price_desc") => Ok(CatalogSort::PriceDesc),
        Some("year_desc") => Ok(CatalogSort::YearDesc),
        Some(_) => Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_sort",
            "sort must be one of: newest, price_asc, price_desc, year_desc",
        )),
    }
}

fn parse_listing_id(id: &str) -> Result<AggregateId, axum::response::Response> {
    id.parse().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid listing id")
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Catalog (storefront)
// ─────────────────────────────────────────────────────────────────────────────

pub async fn browse_catalog(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::BrowseQuery>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::authorize_any(&tenant, &principal, &read_permissions()) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let sort = match parse_sort(query.sort.as_deref()) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let filter = CatalogFilter {
        category: query.category,
        brand: query.brand,
        condition: query.condition,
        min_price_cents: query.min_price_cents,
        max_price_cents: query.max_price_cents,
        min_year: query.min_year,
        max_mileage: query.max_mileage,
        search: query.search,
    };

    let page = services.catalog_browse(
        tenant.tenant_id(),
        &filter,
        sort,
        query.page.unwrap_or(1),
    );
    (StatusCode::OK, Json(dto::catalog_page_to_json(page))).into_response()
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::authorize_any(&tenant, &principal, &read_permissions()) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let categories = services.catalog_categories(tenant.tenant_id());
    (StatusCode::OK, Json(serde_json::json!({ "categories": categories }))).into_response()
}

pub async fn list_brands(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::authorize_any(&tenant, &principal, &read_permissions()) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let brands = services.catalog_brands(tenant.tenant_id());
    (StatusCode::OK, Json(serde_json::json!({ "brands": brands }))).into_response()
}

/// Storefront listing detail. Hidden (pending, rejected, archived) listings
/// read as absent here; sellers see them through `/listings/:id`.
pub async fn get_catalog_listing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::authorize_any(&tenant, &principal, &read_permissions()) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let agg = match parse_listing_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.catalog_get(tenant.tenant_id(), &ListingId::new(agg)) {
        Some(rm) if rm.is_on_market() => {
            let saved = services.wishlist_is_saved(
                tenant.tenant_id(),
                principal.user_id(),
                ListingId::new(agg),
            );
            let mut body = dto::listing_to_json(rm);
            body["saved"] = serde_json::json!(saved);
            (StatusCode::OK, Json(body)).into_response()
        }
        _ => errors::json_error(StatusCode::NOT_FOUND, "not_found", "listing not found"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Listing management
// ─────────────────────────────────────────────────────────────────────────────

pub async fn create_listing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateListingRequest>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::authorize_any(&tenant, &principal, &write_permissions()) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let agg = AggregateId::new();
    let listing_id = ListingId::new(agg);
    let seller_id = principal.user_id();

    let cmd = ListingCommand::CreateListing(CreateListing {
        tenant_id: tenant.tenant_id(),
        listing_id,
        seller_id,
        title: body.title.clone(),
        condition: body.condition,
        details: body.details,
        price_cents: body.price_cents,
        stock: body.stock,
        occurred_at: Utc::now(),
    });

    let committed = match services.dispatch::<Listing>(
        tenant.tenant_id(),
        agg,
        "listings.listing",
        cmd,
        |_t, aggregate_id| Listing::empty(ListingId::new(aggregate_id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    // Staff-created listings skip the review queue.
    let reviewers_can_skip =
        crate::authz::has_permission(&tenant, &principal, &Permission::new("listings.approve"));
    if reviewers_can_skip {
        let approve = ListingCommand::ApproveListing(ApproveListing {
            tenant_id: tenant.tenant_id(),
            listing_id,
            note: None,
            occurred_at: Utc::now(),
        });
        if let Err(e) = services.dispatch::<Listing>(
            tenant.tenant_id(),
            agg,
            "listings.listing",
            approve,
            |_t, aggregate_id| Listing::empty(ListingId::new(aggregate_id)),
        ) {
            return errors::dispatch_error_to_response(e);
        }
    } else {
        notify_reviewers(&services, &tenant, &principal, &body.title);
    }

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

/// Email every staff user who can approve listings. Best-effort.
fn notify_reviewers(
    services: &Arc<AppServices>,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    listing_title: &str,
) {
    let seller_name = services
        .users_get(tenant.tenant_id(), &principal.user_id())
        .map(|u| u.display_name)
        .unwrap_or_else(|| "a seller".to_string());

    for user in services.users_list(tenant.tenant_id()) {
        // Recipients are whoever the central policy lets approve listings,
        // not a hard-coded role list.
        let can_review = services
            .users_effective_permissions(
                tenant.tenant_id(),
                &user.user_id,
                default_role_permissions,
            )
            .is_some_and(|e| e.allows("listings.approve"));
        if !can_review {
            continue;
        }
        let email = motormart_notify::templates::approval_required(
            tenant.tenant_id(),
            &user.email,
            listing_title,
            &seller_name,
        );
        if let Err(e) = services.email().send(&email) {
            tracing::warn!("approval notification failed: {e}");
        }
    }
}

pub async fn my_listings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::authorize_command(
        &tenant,
        &principal,
        &CmdAuth { inner: (), required: vec![Permission::new("listings.read")] },
    ) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let items = services
        .catalog_for_seller(tenant.tenant_id(), principal.user_id())
        .into_iter()
        .map(dto::listing_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn pending_listings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::authorize_command(
        &tenant,
        &principal,
        &CmdAuth { inner: (), required: vec![Permission::new("listings.approve")] },
    ) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let items = services
        .catalog_pending_review(tenant.tenant_id())
        .into_iter()
        .map(dto::listing_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// Seller/staff listing detail: visible regardless of approval state, but
/// only to the owner or staff.
pub async fn get_listing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::authorize_command(
        &tenant,
        &principal,
        &CmdAuth { inner: (), required: vec![Permission::new("listings.read")] },
    ) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let agg = match parse_listing_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.catalog_get(tenant.tenant_id(), &ListingId::new(agg)) {
        Some(rm)
            if rm.seller_id == principal.user_id() || is_staff(&tenant, &principal) =>
        {
            (StatusCode::OK, Json(dto::listing_to_json(rm))).into_response()
        }
        _ => errors::json_error(StatusCode::NOT_FOUND, "not_found", "listing not found"),
    }
}

pub async fn update_listing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateListingRequest>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::authorize_any(&tenant, &principal, &write_permissions()) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let agg = match parse_listing_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = ListingCommand::UpdateListing(UpdateListing {
        tenant_id: tenant.tenant_id(),
        listing_id: ListingId::new(agg),
        actor_id: principal.user_id(),
        actor_is_staff: is_staff(&tenant, &principal),
        title: body.title,
        condition: body.condition,
        details: body.details,
        occurred_at: Utc::now(),
    });

    dispatch_listing(&services, &tenant, agg, cmd, StatusCode::OK)
}

pub async fn set_price(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetPriceRequest>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::authorize_any(&tenant, &principal, &write_permissions()) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let agg = match parse_listing_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = ListingCommand::SetPrice(SetPrice {
        tenant_id: tenant.tenant_id(),
        listing_id: ListingId::new(agg),
        actor_id: principal.user_id(),
        actor_is_staff: is_staff(&tenant, &principal),
        price_cents: body.price_cents,
        occurred_at: Utc::now(),
    });

    dispatch_listing(&services, &tenant, agg, cmd, StatusCode::OK)
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::authorize_any(&tenant, &principal, &write_permissions()) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let agg = match parse_listing_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = ListingCommand::AdjustStock(AdjustStock {
        tenant_id: tenant.tenant_id(),
        listing_id: ListingId::new(agg),
        actor_id: principal.user_id(),
        actor_is_staff: is_staff(&tenant, &principal),
        delta: body.delta,
        occurred_at: Utc::now(),
    });

    dispatch_listing(&services, &tenant, agg, cmd, StatusCode::OK)
}

pub async fn approve_listing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ApproveListingRequest>,
) -> axum::response::Response {
    let agg = match parse_listing_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = ListingCommand::ApproveListing(ApproveListing {
        tenant_id: tenant.tenant_id(),
        listing_id: ListingId::new(agg),
        note: body.note,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("listings.approve")],
    };
    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_listing(&services, &tenant, agg, cmd_auth.inner, StatusCode::OK)
}

pub async fn reject_listing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RejectListingRequest>,
) -> axum::response::Response {
    let agg = match parse_listing_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = ListingCommand::RejectListing(RejectListing {
        tenant_id: tenant.tenant_id(),
        listing_id: ListingId::new(agg),
        note: body.note,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("listings.approve")],
    };
    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_listing(&services, &tenant, agg, cmd_auth.inner, StatusCode::OK)
}

pub async fn archive_listing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::authorize_any(&tenant, &principal, &write_permissions()) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let agg = match parse_listing_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = ListingCommand::ArchiveListing(ArchiveListing {
        tenant_id: tenant.tenant_id(),
        listing_id: ListingId::new(agg),
        actor_id: principal.user_id(),
        actor_is_staff: is_staff(&tenant, &principal),
        occurred_at: Utc::now(),
    });

    dispatch_listing(&services, &tenant, agg, cmd, StatusCode::OK)
}

fn dispatch_listing(
    services: &Arc<AppServices>,
    tenant: &TenantContext,
    agg: AggregateId,
    cmd: ListingCommand,
    ok_status: StatusCode,
) -> axum::response::Response {
    match services.dispatch::<Listing>(
        tenant.tenant_id(),
        agg,
        "listings.listing",
        cmd,
        |_t, aggregate_id| Listing::empty(ListingId::new(aggregate_id)),
    ) {
        Ok(committed) => (
            ok_status,
            Json(serde_json::json!({
                "id": agg.to_string(),
                "events_committed": committed.len(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
