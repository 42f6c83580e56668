//! Event inspection routes for audit and debugging.
//!
//! Raw event payloads cross every privacy boundary in the tenant (cart
//! streams, message bodies), so these routes sit behind
//! `admin.events.read`, which no role grants directly; only the admin
//! wildcard reaches it.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use motormart_auth::Permission;
use motormart_core::AggregateId;
use motormart_infra::event_store::{EventFilter, Pagination};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::errors;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_events))
        .route("/aggregates/:id", get(aggregate_events))
        .route("/:event_id", get(get_event))
}

#[derive(Debug, Deserialize)]
pub struct EventListQuery {
    pub aggregate_id: Option<String>,
    pub aggregate_type: Option<String>,
    pub event_type: Option<String>,
    pub occurred_after: Option<DateTime<Utc>>,
    pub occurred_before: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

fn authorize_read(
    tenant: &TenantContext,
    principal: &PrincipalContext,
) -> Result<(), axum::response::Response> {
    let cmd_auth = CmdAuth { inner: (), required: vec![Permission::new("admin.events.read")] };
    crate::authz::authorize_command(tenant, principal, &cmd_auth)
        .map_err(|e| errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}

pub async fn list_events(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<EventListQuery>,
) -> axum::response::Response {
    if let Err(resp) = authorize_read(&tenant, &principal) {
        return resp;
    }

    let aggregate_id = match query.aggregate_id {
        Some(raw) => match raw.parse::<AggregateId>() {
            Ok(v) => Some(v),
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid aggregate id",
                )
            }
        },
        None => None,
    };

    let filter = EventFilter {
        aggregate_id,
        aggregate_type: query.aggregate_type,
        event_type: query.event_type,
        occurred_after: query.occurred_after,
        occurred_before: query.occurred_before,
    };
    let pagination = Pagination::new(query.limit, query.offset);

    match services.query_events(tenant.tenant_id(), filter, pagination).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "event_store",
            e.to_string(),
        ),
    }
}

pub async fn aggregate_events(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Query(query): Query<EventListQuery>,
) -> axum::response::Response {
    if let Err(resp) = authorize_read(&tenant, &principal) {
        return resp;
    }
    let aggregate_id: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_id",
                "invalid aggregate id",
            )
        }
    };

    let pagination = (query.limit.is_some() || query.offset.is_some())
        .then(|| Pagination::new(query.limit, query.offset));

    match services
        .get_aggregate_events(tenant.tenant_id(), aggregate_id, pagination)
        .await
    {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "event_store",
            e.to_string(),
        ),
    }
}

pub async fn get_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(event_id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authorize_read(&tenant, &principal) {
        return resp;
    }
    let event_id: uuid::Uuid = match event_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid event id")
        }
    };

    match services.get_event_by_id(tenant.tenant_id(), event_id).await {
        Ok(Some(event)) => (StatusCode::OK, Json(event)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "event not found"),
        Err(e) => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "event_store",
            e.to_string(),
        ),
    }
}
