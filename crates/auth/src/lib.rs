//! `motormart-auth` — pure authentication/authorization boundary (zero-trust).
//!
//! This crate is intentionally decoupled from HTTP and storage. The only IO
//! here is JWT signature verification in [`jwt`].

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod user;

pub use authorize::{
    authorize, explain_authorization, AuthorizationExplanation, AuthzError, CommandAuthorization,
    Principal, RbacRegistry,
};
pub use claims::{validate_claims, JwtClaims, TokenValidationError};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
pub use permissions::Permission;
pub use principal::{PrincipalId, TenantMembership};
pub use roles::Role;
pub use user::{
    ActivateUser, AssignRole, CreateUser, ProfileUpdated, RevokeRole, RoleAssigned, RoleRevoked,
    SuspendUser, UpdateProfile, User, UserActivated, UserCommand, UserCreated, UserEvent,
    UserProfile, UserStatus, UserSuspended,
};
