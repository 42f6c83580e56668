//! `motormart-notify`
//!
//! **Responsibility:** Outbound notification boundary (email today).
//!
//! This crate is intentionally **not** part of the domain model:
//! - It must not depend on marketplace aggregates (Listings/Orders/etc).
//! - It must not mutate domain state.
//! - Delivery failures are reported to the caller, which decides whether
//!   they are fatal (checkout treats them as non-fatal).

pub mod email;
pub mod templates;

pub use email::{EmailMessage, EmailSender, LogEmailSender, NotifyError};
