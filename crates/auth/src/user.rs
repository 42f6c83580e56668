//! User aggregate for identity management (event-sourced).
//!
//! User lifecycle with strict tenant isolation and privilege escalation
//! prevention. Account state (roles, suspension) and contact profile both
//! live here; credentials do not (password handling is outside this crate).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use motormart_core::{Aggregate, AggregateRoot, DomainError, TenantId, UserId};
use motormart_events::Event;

use crate::Role;

// ─────────────────────────────────────────────────────────────────────────────
// User Status
// ─────────────────────────────────────────────────────────────────────────────

/// User account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// User is active and can authenticate/transact.
    #[default]
    Active,
    /// User is suspended and cannot authenticate.
    Suspended,
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UserStatus::Active => write!(f, "Active"),
            UserStatus::Suspended => write!(f, "Suspended"),
        }
    }
}

/// Contact details shown on orders and seller pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserProfile {
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// User Aggregate
// ─────────────────────────────────────────────────────────────────────────────

/// User aggregate for identity management.
///
/// # Invariants
/// - A user belongs to exactly one tenant (tenant_id is immutable after creation).
/// - Roles are tenant-scoped (no cross-tenant role grants).
/// - Suspended users cannot be assigned new roles.
/// - Users cannot escalate their own privileges.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub tenant_id: Option<TenantId>,
    pub email: String,
    pub display_name: String,
    pub roles: Vec<Role>,
    pub profile: UserProfile,
    pub status: UserStatus,
    pub version: u64,
    pub created: bool,
}

impl Default for User {
    fn default() -> Self {
        Self {
            id: UserId::new(),
            tenant_id: None,
            email: String::new(),
            display_name: String::new(),
            roles: Vec::new(),
            profile: UserProfile::default(),
            status: UserStatus::Active,
            version: 0,
            created: false,
        }
    }
}

impl User {
    pub fn new(tenant_id: TenantId, id: UserId) -> Self {
        Self {
            id,
            tenant_id: Some(tenant_id),
            ..Default::default()
        }
    }

    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_not_suspended(&self) -> Result<(), DomainError> {
        if self.status == UserStatus::Suspended {
            return Err(DomainError::invariant("user is suspended"));
        }
        Ok(())
    }
}

impl AggregateRoot for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Command to create a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub initial_roles: Vec<Role>,
    pub occurred_at: DateTime<Utc>,
}

/// Command to assign a role to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRole {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: Role,
    /// The roles of the actor performing this operation (for escalation check).
    pub actor_roles: Vec<Role>,
    pub occurred_at: DateTime<Utc>,
}

/// Command to revoke a role from a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeRole {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

/// Command to suspend a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspendUser {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command to activate a suspended user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivateUser {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command to update contact details. `None` fields are left unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// All user commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UserCommand {
    Create(CreateUser),
    AssignRole(AssignRole),
    RevokeRole(RevokeRole),
    Suspend(SuspendUser),
    Activate(ActivateUser),
    UpdateProfile(UpdateProfile),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// Event emitted when a user is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreated {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub initial_roles: Vec<Role>,
    pub occurred_at: DateTime<Utc>,
}

/// Event emitted when a role is assigned to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAssigned {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

/// Event emitted when a role is revoked from a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleRevoked {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

/// Event emitted when a user is suspended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSuspended {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event emitted when a user is activated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserActivated {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event emitted when contact details change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUpdated {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// All user events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UserEvent {
    Created(UserCreated),
    RoleAssigned(RoleAssigned),
    RoleRevoked(RoleRevoked),
    Suspended(UserSuspended),
    Activated(UserActivated),
    ProfileUpdated(ProfileUpdated),
}

impl Event for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::Created(_) => "auth.user.created",
            UserEvent::RoleAssigned(_) => "auth.user.role_assigned",
            UserEvent::RoleRevoked(_) => "auth.user.role_revoked",
            UserEvent::Suspended(_) => "auth.user.suspended",
            UserEvent::Activated(_) => "auth.user.activated",
            UserEvent::ProfileUpdated(_) => "auth.user.profile_updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::Created(e) => e.occurred_at,
            UserEvent::RoleAssigned(e) => e.occurred_at,
            UserEvent::RoleRevoked(e) => e.occurred_at,
            UserEvent::Suspended(e) => e.occurred_at,
            UserEvent::Activated(e) => e.occurred_at,
            UserEvent::ProfileUpdated(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for User {
    type Command = UserCommand;
    type Event = UserEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UserEvent::Created(e) => self.apply_created(e),
            UserEvent::RoleAssigned(e) => self.apply_role_assigned(e),
            UserEvent::RoleRevoked(e) => self.apply_role_revoked(e),
            UserEvent::Suspended(e) => self.apply_suspended(e),
            UserEvent::Activated(e) => self.apply_activated(e),
            UserEvent::ProfileUpdated(e) => self.apply_profile_updated(e),
        }
        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            UserCommand::Create(cmd) => self.handle_create(cmd),
            UserCommand::AssignRole(cmd) => self.handle_assign_role(cmd),
            UserCommand::RevokeRole(cmd) => self.handle_revoke_role(cmd),
            UserCommand::Suspend(cmd) => self.handle_suspend(cmd),
            UserCommand::Activate(cmd) => self.handle_activate(cmd),
            UserCommand::UpdateProfile(cmd) => self.handle_update_profile(cmd),
        }
    }
}

impl User {
    // ─────────────────────────────────────────────────────────────────────────
    // Command Handlers
    // ─────────────────────────────────────────────────────────────────────────

    fn handle_create(&self, cmd: &CreateUser) -> Result<Vec<UserEvent>, DomainError> {
        if self.created {
            return Err(DomainError::invariant("user already exists"));
        }

        if cmd.email.trim().is_empty() || !cmd.email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }

        if cmd.display_name.trim().is_empty() {
            return Err(DomainError::validation("display name cannot be empty"));
        }

        Ok(vec![UserEvent::Created(UserCreated {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            email: cmd.email.trim().to_lowercase(),
            display_name: cmd.display_name.trim().to_string(),
            initial_roles: cmd.initial_roles.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign_role(&self, cmd: &AssignRole) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }

        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_not_suspended()?;

        if self.roles.iter().any(|r| r.as_str() == cmd.role.as_str()) {
            return Err(DomainError::invariant("role already assigned"));
        }

        // Escalation check: actors can only hand out roles they hold
        // themselves, except admins, who can assign anything.
        let actor_has_admin = cmd.actor_roles.iter().any(|r| r.as_str() == "admin");
        let actor_has_role = cmd
            .actor_roles
            .iter()
            .any(|r| r.as_str() == cmd.role.as_str());

        if !actor_has_admin && !actor_has_role {
            return Err(DomainError::Unauthorized);
        }

        Ok(vec![UserEvent::RoleAssigned(RoleAssigned {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            role: cmd.role.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revoke_role(&self, cmd: &RevokeRole) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }

        self.ensure_tenant(cmd.tenant_id)?;

        if !self.roles.iter().any(|r| r.as_str() == cmd.role.as_str()) {
            return Err(DomainError::invariant("role not assigned"));
        }

        Ok(vec![UserEvent::RoleRevoked(RoleRevoked {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            role: cmd.role.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_suspend(&self, cmd: &SuspendUser) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }

        self.ensure_tenant(cmd.tenant_id)?;

        if self.status == UserStatus::Suspended {
            return Err(DomainError::invariant("user already suspended"));
        }

        Ok(vec![UserEvent::Suspended(UserSuspended {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_activate(&self, cmd: &ActivateUser) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }

        self.ensure_tenant(cmd.tenant_id)?;

        if self.status == UserStatus::Active {
            return Err(DomainError::invariant("user already active"));
        }

        Ok(vec![UserEvent::Activated(UserActivated {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_profile(&self, cmd: &UpdateProfile) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }

        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_not_suspended()?;

        if let Some(name) = &cmd.display_name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("display name cannot be empty"));
            }
        }

        let all_unset = cmd.display_name.is_none()
            && cmd.phone.is_none()
            && cmd.address.is_none()
            && cmd.city.is_none()
            && cmd.country.is_none();
        if all_unset {
            return Err(DomainError::validation("no profile fields to update"));
        }

        Ok(vec![UserEvent::ProfileUpdated(ProfileUpdated {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            display_name: cmd.display_name.as_ref().map(|s| s.trim().to_string()),
            phone: cmd.phone.clone(),
            address: cmd.address.clone(),
            city: cmd.city.clone(),
            country: cmd.country.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Event Appliers
    // ─────────────────────────────────────────────────────────────────────────

    fn apply_created(&mut self, e: &UserCreated) {
        self.id = e.user_id;
        self.tenant_id = Some(e.tenant_id);
        self.email = e.email.clone();
        self.display_name = e.display_name.clone();
        self.roles = e.initial_roles.clone();
        self.status = UserStatus::Active;
        self.created = true;
    }

    fn apply_role_assigned(&mut self, e: &RoleAssigned) {
        self.roles.push(e.role.clone());
    }

    fn apply_role_revoked(&mut self, e: &RoleRevoked) {
        self.roles.retain(|r| r.as_str() != e.role.as_str());
    }

    fn apply_suspended(&mut self, _e: &UserSuspended) {
        self.status = UserStatus::Suspended;
    }

    fn apply_activated(&mut self, _e: &UserActivated) {
        self.status = UserStatus::Active;
    }

    fn apply_profile_updated(&mut self, e: &ProfileUpdated) {
        if let Some(name) = &e.display_name {
            self.display_name = name.clone();
        }
        if e.phone.is_some() {
            self.profile.phone = e.phone.clone();
        }
        if e.address.is_some() {
            self.profile.address = e.address.clone();
        }
        if e.city.is_some() {
            self.profile.city = e.city.clone();
        }
        if e.country.is_some() {
            self.profile.country = e.country.clone();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
