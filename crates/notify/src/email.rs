use serde::{Deserialize, Serialize};
use thiserror::Error;

use motormart_core::TenantId;

/// A fully rendered email, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub tenant_id: TenantId,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    pub fn new(
        tenant_id: TenantId,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id,
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Delivery seam for outbound email.
///
/// Transport agnostic; an SMTP or provider-backed implementation slots in
/// behind the same trait.
pub trait EmailSender: Send + Sync + 'static {
    fn send(&self, message: &EmailMessage) -> Result<(), NotifyError>;
}

impl<T: EmailSender + ?Sized> EmailSender for std::sync::Arc<T> {
    fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        (**self).send(message)
    }
}

/// Sender that writes emails to the structured log instead of the wire.
///
/// Default in development and tests.
#[derive(Debug, Default, Copy, Clone)]
pub struct LogEmailSender;

impl LogEmailSender {
    pub fn new() -> Self {
        Self
    }
}

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        if message.to.trim().is_empty() || !message.to.contains('@') {
            return Err(NotifyError::InvalidMessage(
                "recipient address is not a valid email".to_string(),
            ));
        }

        tracing::info!(
            tenant_id = %message.tenant_id,
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "email delivered to log sink"
        );
        Ok(())
    }
}
