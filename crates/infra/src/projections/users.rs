//! Users projection for identity management read models.
//!
//! Also home of the single role-to-permission mapping every authorization
//! check goes through.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use motormart_auth::{UserEvent, UserStatus};
use motormart_core::{TenantId, UserId};
use motormart_events::EventEnvelope;

use crate::read_model::TenantStore;

/// User read model for queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserReadModel {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub email: String,
    pub display_name: String,
    pub roles: Vec<String>,
    pub status: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Effective permissions read model for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectivePermissions {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl EffectivePermissions {
    /// True when the set grants the permission, directly or via wildcard.
    pub fn allows(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == "*" || p == permission)
    }
}

/// Projection that maintains the user directory per tenant.
pub struct UsersProjection<S> {
    store: S,
}

impl<S> UsersProjection<S>
where
    S: TenantStore<UserId, UserReadModel>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<serde_json::Value>,
    ) -> Result<(), anyhow::Error> {
        if envelope.aggregate_type() != "auth.user" {
            return Ok(());
        }

        let event: UserEvent = serde_json::from_value(envelope.payload().clone())?;
        let tenant_id = envelope.tenant_id();

        match event {
            UserEvent::Created(e) => {
                let model = UserReadModel {
                    user_id: e.user_id,
                    tenant_id: e.tenant_id,
                    email: e.email,
                    display_name: e.display_name,
                    roles: e
                        .initial_roles
                        .iter()
                        .map(|r| r.as_str().to_string())
                        .collect(),
                    status: UserStatus::Active.to_string(),
                    phone: None,
                    address: None,
                    city: None,
                    country: None,
                    created_at: e.occurred_at,
                    updated_at: e.occurred_at,
                };
                self.store.upsert(tenant_id, e.user_id, model);
            }
            UserEvent::RoleAssigned(e) => {
                if let Some(mut model) = self.store.get(tenant_id, &e.user_id) {
                    let role_str = e.role.as_str().to_string();
                    if !model.roles.contains(&role_str) {
                        model.roles.push(role_str);
                    }
                    model.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.user_id, model);
                }
            }
            UserEvent::RoleRevoked(e) => {
                if let Some(mut model) = self.store.get(tenant_id, &e.user_id) {
                    let role_str = e.role.as_str().to_string();
                    model.roles.retain(|r| r != &role_str);
                    model.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.user_id, model);
                }
            }
            UserEvent::Suspended(e) => {
                if let Some(mut model) = self.store.get(tenant_id, &e.user_id) {
                    model.status = UserStatus::Suspended.to_string();
                    model.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.user_id, model);
                }
            }
            UserEvent::Activated(e) => {
                if let Some(mut model) = self.store.get(tenant_id, &e.user_id) {
                    model.status = UserStatus::Active.to_string();
                    model.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.user_id, model);
                }
            }
            UserEvent::ProfileUpdated(e) => {
                if let Some(mut model) = self.store.get(tenant_id, &e.user_id) {
                    if let Some(display_name) = e.display_name {
                        model.display_name = display_name;
                    }
                    if let Some(phone) = e.phone {
                        model.phone = Some(phone);
                    }
                    if let Some(address) = e.address {
                        model.address = Some(address);
                    }
                    if let Some(city) = e.city {
                        model.city = Some(city);
                    }
                    if let Some(country) = e.country {
                        model.country = Some(country);
                    }
                    model.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.user_id, model);
                }
            }
        }

        Ok(())
    }

    /// Get a single user by ID.
    pub fn get(&self, tenant_id: TenantId, user_id: &UserId) -> Option<UserReadModel> {
        self.store.get(tenant_id, user_id)
    }

    /// List all users for a tenant.
    pub fn list(&self, tenant_id: TenantId) -> Vec<UserReadModel> {
        self.store.list(tenant_id)
    }

    /// Get a user by email (linear scan).
    pub fn get_by_email(&self, tenant_id: TenantId, email: &str) -> Option<UserReadModel> {
        let normalized = email.trim().to_lowercase();
        self.list(tenant_id)
            .into_iter()
            .find(|u| u.email == normalized)
    }

    /// Compute effective permissions from a role-to-permission mapping.
    pub fn effective_permissions<F>(
        &self,
        tenant_id: TenantId,
        user_id: &UserId,
        role_permissions: F,
    ) -> Option<EffectivePermissions>
    where
        F: Fn(&str) -> Vec<String>,
    {
        let model = self.get(tenant_id, user_id)?;

        let mut all_permissions: HashSet<String> = HashSet::new();
        for role in &model.roles {
            for perm in role_permissions(role) {
                all_permissions.insert(perm);
            }
        }

        Some(EffectivePermissions {
            user_id: model.user_id,
            tenant_id: model.tenant_id,
            roles: model.roles,
            permissions: all_permissions.into_iter().collect(),
        })
    }
}

/// The role-to-permission mapping.
///
/// Every authorization decision resolves roles through this one function;
/// route handlers never check role names directly.
pub fn default_role_permissions(role: &str) -> Vec<String> {
    match role {
        "admin" => {
            // Admins get all permissions (wildcard)
            vec!["*".to_string()]
        }
        "manager" => vec![
            // Moderation
            "listings.read".to_string(),
            "listings.write".to_string(),
            "listings.approve".to_string(),
            // Fulfilment
            "orders.read".to_string(),
            "orders.update".to_string(),
            "dashboard.read".to_string(),
            // User management (limited)
            "admin.users.list".to_string(),
            "admin.users.read".to_string(),
        ],
        "seller" => vec![
            // Own inventory
            "listings.read".to_string(),
            "listings.own.write".to_string(),
            // Sales visibility
            "orders.own.read".to_string(),
            "dashboard.own.read".to_string(),
            "requests.respond".to_string(),
            // Buyer contact
            "messages.read".to_string(),
            "messages.send".to_string(),
        ],
        "buyer" => vec![
            "catalog.read".to_string(),
            "cart.write".to_string(),
            "checkout.write".to_string(),
            "orders.own.read".to_string(),
            "orders.own.cancel".to_string(),
            "wishlist.write".to_string(),
            "messages.read".to_string(),
            "messages.send".to_string(),
            "requests.create".to_string(),
        ],
        // Unknown roles get no permissions
        _ => vec![],
    }
}
