//! User administration routes, plus the self-service profile update
//! mounted at `PUT /profile`.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use motormart_auth::{
    ActivateUser, AssignRole, CreateUser, Permission, RevokeRole, Role, SuspendUser,
    UpdateProfile, User, UserCommand,
};
use motormart_core::{AggregateId, UserId};
use motormart_infra::projections::default_role_permissions;

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/users", post(create_user).get(list_users))
        .route("/users/:id", get(get_user))
        .route("/users/:id/roles", post(assign_role))
        .route("/users/:id/roles/:role", axum::routing::delete(revoke_role))
        .route("/users/:id/suspend", post(suspend_user))
        .route("/users/:id/activate", post(activate_user))
        .route("/users/:id/permissions", get(inspect_permissions))
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

fn parse_user_id(id: &str) -> Result<UserId, axum::response::Response> {
    id.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id"))
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateUserRequest>,
) -> axum::response::Response {
    if let Err(resp) = authorize(&tenant, &principal, "admin.users.write") {
        return resp;
    }
    if services.users_get_by_email(tenant.tenant_id(), &body.email).is_some() {
        return errors::json_error(
            StatusCode::CONFLICT,
            "email_taken",
            "a user with this email already exists",
        );
    }

    let agg = AggregateId::new();
    let user_id = UserId::from(agg);
    let cmd = UserCommand::Create(CreateUser {
        tenant_id: tenant.tenant_id(),
        user_id,
        email: body.email,
        display_name: body.display_name,
        initial_roles: body.roles.into_iter().map(Role::new).collect(),
        occurred_at: Utc::now(),
    });

    match dispatch_user(&services, &tenant, agg, cmd) {
        Ok(committed) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "id": user_id.to_string(),
                "events_committed": committed,
            })),
        )
            .into_response(),
        Err(resp) => resp,
    }
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authorize(&tenant, &principal, "admin.users.list") {
        return resp;
    }
    let items = services
        .users_list(tenant.tenant_id())
        .into_iter()
        .map(dto::user_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authorize(&tenant, &principal, "admin.users.read") {
        return resp;
    }
    let user_id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.users_get(tenant.tenant_id(), &user_id) {
        Some(rm) => (StatusCode::OK, Json(dto::user_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "user not found"),
    }
}

pub async fn assign_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RoleRequest>,
) -> axum::response::Response {
    if let Err(resp) = authorize(&tenant, &principal, "admin.users.write") {
        return resp;
    }
    let user_id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    // The aggregate rejects grants that would escalate past the actor's own
    // roles, so the caller's roles ride along with the command.
    let cmd = UserCommand::AssignRole(AssignRole {
        tenant_id: tenant.tenant_id(),
        user_id,
        role: Role::new(body.role),
        actor_roles: principal.roles().to_vec(),
        occurred_at: Utc::now(),
    });

    respond_user_dispatch(&services, &tenant, user_id, cmd)
}

pub async fn revoke_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, role)): Path<(String, String)>,
) -> axum::response::Response {
    if let Err(resp) = authorize(&tenant, &principal, "admin.users.write") {
        return resp;
    }
    let user_id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = UserCommand::RevokeRole(RevokeRole {
        tenant_id: tenant.tenant_id(),
        user_id,
        role: Role::new(role),
        occurred_at: Utc::now(),
    });

    respond_user_dispatch(&services, &tenant, user_id, cmd)
}

pub async fn suspend_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SuspendUserRequest>,
) -> axum::response::Response {
    if let Err(resp) = authorize(&tenant, &principal, "admin.users.write") {
        return resp;
    }
    let user_id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if user_id == principal.user_id() {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "self_suspend",
            "an administrator cannot suspend their own account",
        );
    }

    let cmd = UserCommand::Suspend(SuspendUser {
        tenant_id: tenant.tenant_id(),
        user_id,
        reason: body.reason,
        occurred_at: Utc::now(),
    });

    respond_user_dispatch(&services, &tenant, user_id, cmd)
}

pub async fn activate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authorize(&tenant, &principal, "admin.users.write") {
        return resp;
    }
    let user_id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = UserCommand::Activate(ActivateUser {
        tenant_id: tenant.tenant_id(),
        user_id,
        occurred_at: Utc::now(),
    });

    respond_user_dispatch(&services, &tenant, user_id, cmd)
}

/// Resolved permissions for a user, computed from their stored roles.
pub async fn inspect_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authorize(&tenant, &principal, "admin.users.read") {
        return resp;
    }
    let user_id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.users_effective_permissions(
        tenant.tenant_id(),
        &user_id,
        default_role_permissions,
    ) {
        Some(eff) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "user_id": eff.user_id.to_string(),
                "tenant_id": eff.tenant_id.to_string(),
                "roles": eff.roles,
                "permissions": eff.permissions,
            })),
        )
            .into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "user not found"),
    }
}

/// `PUT /profile`. Any authenticated principal may edit their own profile.
pub async fn update_my_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::UpdateProfileRequest>,
) -> axum::response::Response {
    let user_id = principal.user_id();
    let cmd = UserCommand::UpdateProfile(UpdateProfile {
        tenant_id: tenant.tenant_id(),
        user_id,
        display_name: body.display_name,
        phone: body.phone,
        address: body.address,
        city: body.city,
        country: body.country,
        occurred_at: Utc::now(),
    });

    respond_user_dispatch(&services, &tenant, user_id, cmd)
}

fn respond_user_dispatch(
    services: &Arc<AppServices>,
    tenant: &TenantContext,
    user_id: UserId,
    cmd: UserCommand,
) -> axum::response::Response {
    match dispatch_user(services, tenant, AggregateId::from(user_id), cmd) {
        Ok(committed) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": user_id.to_string(),
                "events_committed": committed,
            })),
        )
            .into_response(),
        Err(resp) => resp,
    }
}

fn dispatch_user(
    services: &Arc<AppServices>,
    tenant: &TenantContext,
    agg: AggregateId,
    cmd: UserCommand,
) -> Result<usize, axum::response::Response> {
    services
        .dispatch::<User>(tenant.tenant_id(), agg, "auth.user", cmd, |_t, aggregate_id| {
            User::empty(UserId::from(aggregate_id))
        })
        .map(|committed| committed.len())
        .map_err(errors::dispatch_error_to_response)
}
