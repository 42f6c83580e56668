use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use motormart_core::TenantId;

/// Upper bound on a single card charge, in cents.
///
/// Card processors cap individual authorizations; amounts above this must go
/// through bank transfer instead.
pub const MAX_CHARGE_CENTS: u64 = 99_999_999;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Succeeded,
    RequiresAction,
    Failed,
}

/// A created (and possibly settled) payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub intent_id: Uuid,
    pub tenant_id: TenantId,
    pub amount_cents: u64,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("amount exceeds the card charge limit")]
    AmountTooLarge,

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("unknown payment intent: {0}")]
    UnknownIntent(Uuid),

    #[error("gateway error: {0}")]
    Gateway(String),
}

/// Gateway seam for card payments.
pub trait PaymentService: Send + Sync + 'static {
    /// Create an intent for the given amount. Enforces [`MAX_CHARGE_CENTS`].
    fn create_intent(
        &self,
        tenant_id: TenantId,
        amount_cents: u64,
    ) -> Result<PaymentIntent, PaymentError>;

    /// Confirm a previously created intent.
    fn confirm(&self, intent_id: Uuid) -> Result<PaymentIntent, PaymentError>;
}

impl<T: PaymentService + ?Sized> PaymentService for std::sync::Arc<T> {
    fn create_intent(
        &self,
        tenant_id: TenantId,
        amount_cents: u64,
    ) -> Result<PaymentIntent, PaymentError> {
        (**self).create_intent(tenant_id, amount_cents)
    }

    fn confirm(&self, intent_id: Uuid) -> Result<PaymentIntent, PaymentError> {
        (**self).confirm(intent_id)
    }
}

/// In-process gateway that approves every valid charge.
///
/// Keeps created intents in memory so `confirm` can settle them later.
#[derive(Debug, Default)]
pub struct SimulatedPaymentGateway {
    intents: std::sync::Mutex<std::collections::HashMap<Uuid, PaymentIntent>>,
}

impl SimulatedPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PaymentService for SimulatedPaymentGateway {
    fn create_intent(
        &self,
        tenant_id: TenantId,
        amount_cents: u64,
    ) -> Result<PaymentIntent, PaymentError> {
        if amount_cents == 0 {
            return Err(PaymentError::ZeroAmount);
        }
        if amount_cents > MAX_CHARGE_CENTS {
            return Err(PaymentError::AmountTooLarge);
        }

        let intent = PaymentIntent {
            intent_id: Uuid::now_v7(),
            tenant_id,
            amount_cents,
            status: PaymentStatus::RequiresAction,
            created_at: Utc::now(),
        };

        let mut intents = self
            .intents
            .lock()
            .map_err(|_| PaymentError::Gateway("intent store lock poisoned".to_string()))?;
        intents.insert(intent.intent_id, intent.clone());

        tracing::debug!(
            tenant_id = %tenant_id,
            intent_id = %intent.intent_id,
            amount_cents,
            "payment intent created"
        );
        Ok(intent)
    }

    fn confirm(&self, intent_id: Uuid) -> Result<PaymentIntent, PaymentError> {
        let mut intents = self
            .intents
            .lock()
            .map_err(|_| PaymentError::Gateway("intent store lock poisoned".to_string()))?;

        let intent = intents
            .get_mut(&intent_id)
            .ok_or(PaymentError::UnknownIntent(intent_id))?;
        intent.status = PaymentStatus::Succeeded;

        Ok(intent.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_confirm_intent() {
        let gateway = SimulatedPaymentGateway::new();
        let tenant_id = TenantId::new();

        let intent = gateway.create_intent(tenant_id, 1_500_000).unwrap();
        assert_eq!(intent.status, PaymentStatus::RequiresAction);

        let settled = gateway.confirm(intent.intent_id).unwrap();
        assert_eq!(settled.status, PaymentStatus::Succeeded);
        assert_eq!(settled.amount_cents, 1_500_000);
    }

    #[test]
    fn amount_at_cap_is_accepted() {
        let gateway = SimulatedPaymentGateway::new();

        assert!(gateway.create_intent(TenantId::new(), MAX_CHARGE_CENTS).is_ok());
    }

    #[test]
    fn amount_over_cap_is_rejected() {
        let gateway = SimulatedPaymentGateway::new();

        let err = gateway
            .create_intent(TenantId::new(), MAX_CHARGE_CENTS + 1)
            .unwrap_err();
        assert!(matches!(err, PaymentError::AmountTooLarge));
    }

    #[test]
    fn zero_amount_is_rejected() {
        let gateway = SimulatedPaymentGateway::new();

        let err = gateway.create_intent(TenantId::new(), 0).unwrap_err();
        assert!(matches!(err, PaymentError::ZeroAmount));
    }

    #[test]
    fn confirm_unknown_intent_fails() {
        let gateway = SimulatedPaymentGateway::new();

        let err = gateway.confirm(Uuid::now_v7()).unwrap_err();
        assert!(matches!(err, PaymentError::UnknownIntent(_)));
    }
}
