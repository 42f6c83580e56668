use motormart_core::TenantId;

use crate::envelope::EventEnvelope;

/// Anything carrying a tenant identity.
///
/// Lets generic infrastructure (workers, filters) route messages by tenant
/// without knowing the concrete message type.
pub trait TenantScoped {
    fn tenant_id(&self) -> TenantId;
}

impl<E> TenantScoped for EventEnvelope<E> {
    fn tenant_id(&self) -> TenantId {
        EventEnvelope::tenant_id(self)
    }
}
