//! Dashboard summaries.
//!
//! Staff (`dashboard.read`) get the tenant-wide rollup; sellers
//! (`dashboard.own.read`) get the same shape restricted to their own
//! sales.

use std::sync::Arc;

use axum::{
    extract::Extension, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use chrono::Utc;

use motormart_auth::Permission;

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new().route("/", get(summary))
}

pub async fn summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if crate::authz::has_permission(&tenant, &principal, &Permission::new("dashboard.read")) {
        let summary = services.orders_dashboard(tenant.tenant_id(), Utc::now());
        return (StatusCode::OK, Json(dto::dashboard_to_json(summary))).into_response();
    }

    let cmd_auth = CmdAuth { inner: (), required: vec![Permission::new("dashboard.own.read")] };
    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let summary =
        services.orders_dashboard_for_seller(tenant.tenant_id(), principal.user_id(), Utc::now());
    (StatusCode::OK, Json(dto::dashboard_to_json(summary))).into_response()
}
