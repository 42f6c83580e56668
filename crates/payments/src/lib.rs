//! `motormart-payments`
//!
//! **Responsibility:** Payment processing boundary.
//!
//! Charges are expressed in integer cents. The gateway seam is a trait so
//! checkout never knows whether it is talking to a real processor or the
//! simulated one used in development and tests.

pub mod gateway;

pub use gateway::{
    MAX_CHARGE_CENTS, PaymentError, PaymentIntent, PaymentService, PaymentStatus,
    SimulatedPaymentGateway,
};
