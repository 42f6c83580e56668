//! API-side authorization guard for commands.
//!
//! This enforces authorization at the command boundary (before dispatch),
//! while keeping domain aggregates and infra auth-agnostic. Roles resolve to
//! permissions through the one central mapping in
//! `motormart_infra::projections::users`; handlers never check role names.

use motormart_auth::{
    authorize, AuthzError, CommandAuthorization, Permission, Principal, Role, TenantMembership,
};
use motormart_infra::projections::users::default_role_permissions;

use crate::context::{PrincipalContext, TenantContext};

/// Resolve a role set into its effective permission set (deduplicated).
pub fn permissions_from_roles(roles: &[Role]) -> Vec<Permission> {
    let mut seen = std::collections::HashSet::new();
    roles
        .iter()
        .flat_map(|role| default_role_permissions(role.as_str()))
        .filter(|perm| seen.insert(perm.clone()))
        .map(Permission::new)
        .collect()
}

fn build_principal(tenant: &TenantContext, principal: &PrincipalContext) -> Principal {
    let membership = TenantMembership {
        tenant_id: tenant.tenant_id(),
        roles: principal.roles().to_vec(),
        permissions: permissions_from_roles(principal.roles()),
    };

    Principal {
        principal_id: principal.principal_id(),
        active_tenant_id: tenant.tenant_id(),
        membership,
    }
}

/// Check authorization for a command in the current request context.
///
/// This is intended to be called **before** dispatching a command.
pub fn authorize_command<C: CommandAuthorization>(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let principal = build_principal(tenant, principal);

    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }

    Ok(())
}

/// Succeed when at least one of the given permissions authorizes.
///
/// Some routes are reachable through different grants, e.g. staff hold
/// `listings.write` while sellers hold `listings.own.write` (the aggregate
/// still enforces ownership).
pub fn authorize_any(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    alternatives: &[Permission],
) -> Result<(), AuthzError> {
    let principal = build_principal(tenant, principal);

    let mut last = AuthzError::Forbidden("no permission alternatives supplied".to_string());
    for perm in alternatives {
        match authorize(&principal, perm) {
            Ok(()) => return Ok(()),
            Err(e) => last = e,
        }
    }

    Err(last)
}

/// True when the principal holds the permission in the current tenant.
pub fn has_permission(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    permission: &Permission,
) -> bool {
    authorize(&build_principal(tenant, principal), permission).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use motormart_auth::PrincipalId;
    use motormart_core::TenantId;

    fn ctx(roles: &[&str]) -> (TenantContext, PrincipalContext) {
        (
            TenantContext::new(TenantId::new()),
            PrincipalContext::new(
                PrincipalId::new(),
                roles.iter().map(|r| Role::new(r.to_string())).collect(),
            ),
        )
    }

    #[test]
    fn admin_wildcard_authorizes_everything() {
        let (tenant, admin) = ctx(&["admin"]);
        assert!(has_permission(&tenant, &admin, &Permission::new("listings.approve")));
        assert!(has_permission(&tenant, &admin, &Permission::new("admin.users.list")));
    }

    #[test]
    fn buyer_cannot_approve_listings() {
        let (tenant, buyer) = ctx(&["buyer"]);
        assert!(!has_permission(&tenant, &buyer, &Permission::new("listings.approve")));
        assert!(has_permission(&tenant, &buyer, &Permission::new("cart.write")));
    }

    #[test]
    fn any_of_accepts_either_grant() {
        let either = [
            Permission::new("listings.write"),
            Permission::new("listings.own.write"),
        ];

        let (tenant, seller) = ctx(&["seller"]);
        assert!(authorize_any(&tenant, &seller, &either).is_ok());

        let (tenant, buyer) = ctx(&["buyer"]);
        assert!(authorize_any(&tenant, &buyer, &either).is_err());
    }

    #[test]
    fn role_union_deduplicates_permissions() {
        let (_, both) = ctx(&["seller", "buyer"]);
        let perms = permissions_from_roles(both.roles());
        let reads = perms.iter().filter(|p| p.as_str() == "messages.read").count();
        assert_eq!(reads, 1);
    }
}
