use gestor_core::TenantId;

use crate::ChangeBatch;

/// Helper trait for tenant-scoped messages.
///
/// Consumers bound to one tenant use it to ignore deliveries that belong to
/// another tenant (for example a batch still in flight from a previous binding).
pub trait TenantScoped {
    fn tenant_id(&self) -> &TenantId;

    fn belongs_to(&self, tenant_id: &TenantId) -> bool {
        self.tenant_id() == tenant_id
    }
}

impl<D> TenantScoped for ChangeBatch<D> {
    fn tenant_id(&self) -> &TenantId {
        ChangeBatch::tenant_id(self)
    }
}
