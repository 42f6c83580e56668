use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use motormart_core::TenantId;

use crate::{PrincipalId, Role};

/// JWT claims model (transport-agnostic).
///
/// This is the minimal set of claims MotorMart expects once a token has been
/// decoded and its signature verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject / principal identifier.
    pub sub: PrincipalId,

    /// Tenant context for the token.
    pub tenant_id: TenantId,

    /// RBAC roles granted within the tenant context.
    pub roles: Vec<Role>,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate JWT claims.
///
/// Note: this validates the *claims* only. Signature verification lives in
/// [`crate::jwt`].
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> JwtClaims {
        JwtClaims {
            sub: PrincipalId::new(),
            tenant_id: TenantId::new(),
            roles: vec![Role::new("buyer")],
            issued_at,
            expires_at,
        }
    }

    #[test]
    fn valid_window_passes() {
        let now = Utc::now();
        let c = claims(now - Duration::minutes(5), now + Duration::minutes(55));
        assert!(validate_claims(&c, now).is_ok());
    }

    #[test]
    fn expired_token_rejected() {
        let now = Utc::now();
        let c = claims(now - Duration::hours(2), now - Duration::hours(1));
        assert_eq!(validate_claims(&c, now), Err(TokenValidationError::Expired));
    }

    #[test]
    fn future_token_rejected() {
        let now = Utc::now();
        let c = claims(now + Duration::minutes(5), now + Duration::hours(1));
        assert_eq!(
            validate_claims(&c, now),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn inverted_window_rejected() {
        let now = Utc::now();
        let c = claims(now, now - Duration::seconds(1));
        assert_eq!(
            validate_claims(&c, now),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }
}
