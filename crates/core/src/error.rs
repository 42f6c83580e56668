//! Domain error model.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic failure of a domain decision.
///
/// Aggregates return these from `handle`; the API maps each variant to a
/// status code, so the variant chosen is part of the observable contract
/// (`Validation` → 400, `InvariantViolation` → 422, `NotFound` → 404,
/// `Conflict` → 409, `Unauthorized` → 403). Infrastructure failures (store,
/// bus) never travel through this type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or out-of-range input (empty title, zero price).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The command asks for an illegal state change (shipping a cancelled
    /// order, approving an archived listing).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier failed to parse.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The aggregate does not exist yet.
    #[error("not found")]
    NotFound,

    /// Stale state, typically an optimistic-concurrency loss.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The actor may not perform this command (not the owner, not staff).
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
