//! JWT verification (HS256).
//!
//! Signature verification is the only IO-free "crypto" concern in this crate.
//! Claims semantics (time window) stay in [`crate::claims`] so they remain
//! testable without keys.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use thiserror::Error;

use crate::claims::{validate_claims, JwtClaims, TokenValidationError};

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("invalid token: {0}")]
    Invalid(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Verifies a bearer token and returns its claims.
///
/// Trait object friendly so the API layer can swap implementations in tests.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<JwtClaims, JwtError>;
}

/// HS256 validator over a shared secret.
pub struct Hs256JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: Vec<u8>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is carried in our own `expires_at` claim and checked by
        // validate_claims, not by the standard `exp` claim.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            decoding_key: DecodingKey::from_secret(&secret),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str) -> Result<JwtClaims, JwtError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| JwtError::Invalid(e.to_string()))?;

        validate_claims(&data.claims, Utc::now())?;

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PrincipalId, Role};
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};
    use motormart_core::TenantId;

    fn mint(secret: &[u8], claims: &JwtClaims) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    fn fresh_claims() -> JwtClaims {
        let now = Utc::now();
        JwtClaims {
            sub: PrincipalId::new(),
            tenant_id: TenantId::new(),
            roles: vec![Role::new("seller")],
            issued_at: now - Duration::minutes(1),
            expires_at: now + Duration::hours(1),
        }
    }

    #[test]
    fn valid_token_round_trips() {
        let secret = b"test-secret";
        let claims = fresh_claims();
        let token = mint(secret, &claims);

        let validator = Hs256JwtValidator::new(secret.to_vec());
        let decoded = validator.validate(&token).unwrap();

        assert_eq!(decoded, claims);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let claims = fresh_claims();
        let token = mint(b"right-secret", &claims);

        let validator = Hs256JwtValidator::new(b"wrong-secret".to_vec());
        assert!(matches!(
            validator.validate(&token),
            Err(JwtError::Invalid(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let secret = b"test-secret";
        let now = Utc::now();
        let claims = JwtClaims {
            sub: PrincipalId::new(),
            tenant_id: TenantId::new(),
            roles: vec![],
            issued_at: now - Duration::hours(2),
            expires_at: now - Duration::hours(1),
        };
        let token = mint(secret, &claims);

        let validator = Hs256JwtValidator::new(secret.to_vec());
        assert!(matches!(
            validator.validate(&token),
            Err(JwtError::Claims(TokenValidationError::Expired))
        ));
    }

    #[test]
    fn garbage_token_is_rejected() {
        let validator = Hs256JwtValidator::new(b"secret".to_vec());
        assert!(matches!(
            validator.validate("not.a.jwt"),
            Err(JwtError::Invalid(_))
        ));
    }
}
