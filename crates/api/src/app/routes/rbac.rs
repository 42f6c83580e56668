//! RBAC audit routes.
//!
//! Read-only views over the role and permission catalog, plus an
//! explain endpoint that walks through an authorization decision.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use motormart_auth::{
    explain_authorization, Permission, Principal, PrincipalId, RbacRegistry, Role,
    TenantMembership,
};
use motormart_infra::projections::default_role_permissions;

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::errors;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/roles", get(list_roles))
        .route("/roles/:name", get(get_role))
        .route("/permissions", get(list_permissions))
        .route("/permissions/:name", get(get_permission))
        .route("/explain", get(explain))
}

#[derive(Debug, Deserialize)]
pub struct ExplainAuthzQuery {
    pub permission: String,
    pub user_id: Option<String>,
}

fn authorize_read(
    tenant: &TenantContext,
    principal: &PrincipalContext,
) -> Result<(), axum::response::Response> {
    let cmd_auth = CmdAuth { inner: (), required: vec![Permission::new("admin.users.read")] };
    crate::authz::authorize_command(tenant, principal, &cmd_auth)
        .map_err(|e| errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}

fn registry() -> RbacRegistry {
    RbacRegistry::from_role_mapping(default_role_permissions)
}

pub async fn list_roles(
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authorize_read(&tenant, &principal) {
        return resp;
    }
    let registry = registry();
    let mut roles = registry.roles.values().cloned().collect::<Vec<_>>();
    roles.sort_by(|a, b| a.name.cmp(&b.name));
    (StatusCode::OK, Json(serde_json::json!({ "items": roles }))).into_response()
}

pub async fn get_role(
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(name): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authorize_read(&tenant, &principal) {
        return resp;
    }
    match registry().roles.get(&name) {
        Some(role) => (StatusCode::OK, Json(role.clone())).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "role not found"),
    }
}

pub async fn list_permissions(
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authorize_read(&tenant, &principal) {
        return resp;
    }
    let registry = registry();
    let mut permissions = registry.permissions.values().cloned().collect::<Vec<_>>();
    permissions.sort_by(|a, b| a.name.cmp(&b.name));
    (StatusCode::OK, Json(serde_json::json!({ "items": permissions }))).into_response()
}

pub async fn get_permission(
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(name): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authorize_read(&tenant, &principal) {
        return resp;
    }
    match registry().permissions.get(&name) {
        Some(permission) => (StatusCode::OK, Json(permission.clone())).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "permission not found"),
    }
}

/// Explain whether a principal would be granted a permission.
///
/// Without `user_id` the check runs against the caller; with it, against
/// the stored roles of the named user.
pub async fn explain(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<ExplainAuthzQuery>,
) -> axum::response::Response {
    if let Err(resp) = authorize_read(&tenant, &principal) {
        return resp;
    }

    let subject = match query.user_id {
        None => build_subject(&tenant, principal.principal_id(), principal.roles().to_vec()),
        Some(raw) => {
            let user_id = match raw.parse() {
                Ok(v) => v,
                Err(_) => {
                    return errors::json_error(
                        StatusCode::BAD_REQUEST,
                        "invalid_id",
                        "invalid user id",
                    )
                }
            };
            let Some(user) = services.users_get(tenant.tenant_id(), &user_id) else {
                return errors::json_error(StatusCode::NOT_FOUND, "not_found", "user not found");
            };
            build_subject(
                &tenant,
                PrincipalId::from_uuid(*user.user_id.as_uuid()),
                user.roles.into_iter().map(Role::new).collect(),
            )
        }
    };

    let required = Permission::new(query.permission);
    let explanation = explain_authorization(&subject, &required, default_role_permissions);
    (StatusCode::OK, Json(explanation)).into_response()
}

fn build_subject(tenant: &TenantContext, principal_id: PrincipalId, roles: Vec<Role>) -> Principal {
    let permissions = crate::authz::permissions_from_roles(&roles);
    Principal {
        principal_id,
        active_tenant_id: tenant.tenant_id(),
        membership: TenantMembership {
            tenant_id: tenant.tenant_id(),
            roles,
            permissions,
        },
    }
}
