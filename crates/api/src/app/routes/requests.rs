//! Purchase request routes.
//!
//! A buyer opens a request against a listing (optionally with an offer);
//! the seller answers it once and either side can close it.

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
use motormart_messaging::{
    CloseRequest, CreateRequest, PurchaseRequest, PurchaseRequestCommand, PurchaseRequestId,
    RespondToRequest,
};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_request))
        .route("/mine", get(my_requests))
        .route("/received", get(received_requests))
        .route("/:id", get(get_request))
        .route("/:id/respond", post(respond_to_request))
        .route("/:id/close", post(close_request))
}

fn authorize(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    permission: &'static str,
) -> Result<(), axum::response::Response> {
    let cmd_auth = CmdAuth { inner: (), required: vec![Permission::new(permission)] };
    crate::authz::authorize_command(tenant, principal, &cmd_auth)
        .map_err(|e| errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}

fn parse_request_id(id: &str) -> Result<AggregateId, axum::response::Response> {
    id.parse().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid request id")
    })
}

pub async fn create_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreatePurchaseRequestRequest>,
) -> axum::response::Response {
    if let Err(resp) = authorize(&tenant, &principal, "requests.create") {
        return resp;
    }

    let listing_id = match body.listing_id.parse::<AggregateId>() {
        Ok(v) => ListingId::new(v),
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid listing id")
        }
    };
    // The seller is resolved from the listing itself, never from the caller.
    let Some(listing) = services.catalog_get(tenant.tenant_id(), &listing_id) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "listing not found");
    };

    let agg = AggregateId::new();
    let cmd = PurchaseRequestCommand::CreateRequest(CreateRequest {
        tenant_id: tenant.tenant_id(),
        request_id: PurchaseRequestId::new(agg),
        buyer_id: principal.user_id(),
        seller_id: listing.seller_id,
        listing_id,
        message: body.message,
        offered_price_cents: body.offered_price_cents,
        occurred_at: Utc::now(),
    });

    match dispatch_request(&services, &tenant, agg, cmd) {
        Ok(committed) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "id": agg.to_string(),
                "events_committed": committed,
            })),
        )
            .into_response(),
        Err(resp) => resp,
    }
}

pub async fn my_requests(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authorize(&tenant, &principal, "requests.create") {
        return resp;
    }
    let items = services
        .requests_for_buyer(tenant.tenant_id(), principal.user_id())
        .into_iter()
        .map(dto::purchase_request_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn received_requests(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authorize(&tenant, &principal, "requests.respond") {
        return resp;
    }
    let items = services
        .requests_for_seller(tenant.tenant_id(), principal.user_id())
        .into_iter()
        .map(dto::purchase_request_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let either = [
        Permission::new("requests.create"),
        Permission::new("requests.respond"),
    ];
    if let Err(e) = crate::authz::authorize_any(&tenant, &principal, &either) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let agg = match parse_request_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let user_id = principal.user_id();
    match services.requests_get(tenant.tenant_id(), &PurchaseRequestId::new(agg)) {
        Some(rm) if rm.buyer_id == user_id || rm.seller_id == user_id => {
            (StatusCode::OK, Json(dto::purchase_request_to_json(rm))).into_response()
        }
        _ => errors::json_error(StatusCode::NOT_FOUND, "not_found", "request not found"),
    }
}

pub async fn respond_to_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RespondToRequestRequest>,
) -> axum::response::Response {
    if let Err(resp) = authorize(&tenant, &principal, "requests.respond") {
        return resp;
    }
    let agg = match parse_request_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = PurchaseRequestCommand::RespondToRequest(RespondToRequest {
        tenant_id: tenant.tenant_id(),
        request_id: PurchaseRequestId::new(agg),
        actor_id: principal.user_id(),
        response: body.response,
        occurred_at: Utc::now(),
    });

    match dispatch_request(&services, &tenant, agg, cmd) {
        Ok(committed) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": agg.to_string(),
                "events_committed": committed,
            })),
        )
            .into_response(),
        Err(resp) => resp,
    }
}

pub async fn close_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let either = [
        Permission::new("requests.create"),
        Permission::new("requests.respond"),
    ];
    if let Err(e) = crate::authz::authorize_any(&tenant, &principal, &either) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let agg = match parse_request_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = PurchaseRequestCommand::CloseRequest(CloseRequest {
        tenant_id: tenant.tenant_id(),
        request_id: PurchaseRequestId::new(agg),
        actor_id: principal.user_id(),
        occurred_at: Utc::now(),
    });

    match dispatch_request(&services, &tenant, agg, cmd) {
        Ok(committed) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": agg.to_string(),
                "events_committed": committed,
            })),
        )
            .into_response(),
        Err(resp) => resp,
    }
}

fn dispatch_request(
    services: &Arc<AppServices>,
    tenant: &TenantContext,
    agg: AggregateId,
    cmd: PurchaseRequestCommand,
) -> Result<usize, axum::response::Response> {
    services
        .dispatch::<PurchaseRequest>(
            tenant.tenant_id(),
            agg,
            "messaging.purchase_request",
            cmd,
            |_t, aggregate_id| PurchaseRequest::empty(PurchaseRequestId::new(aggregate_id)),
        )
        .map(|committed| committed.len())
        .map_err(errors::dispatch_error_to_response)
}
