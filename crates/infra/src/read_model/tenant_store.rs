use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use motormart_core::TenantId;

/// Tenant-isolated key/value store abstraction for disposable read models.
///
/// Read models are rebuildable from the event log, so durability is not a
/// requirement here; isolation is. Every operation takes the tenant first
/// and can only ever touch that tenant's partition.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V>;
    fn upsert(&self, tenant_id: TenantId, key: K, value: V);
    fn list(&self, tenant_id: TenantId) -> Vec<V>;
    fn remove(&self, tenant_id: TenantId, key: &K);
    /// Clear all read-model records for a tenant (rebuild support).
    fn clear_tenant(&self, tenant_id: TenantId);
}

impl<K, V, S> TenantStore<K, V> for Arc<S>
where
    S: TenantStore<K, V> + ?Sized,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        (**self).get(tenant_id, key)
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        (**self).upsert(tenant_id, key, value)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        (**self).list(tenant_id)
    }

    fn remove(&self, tenant_id: TenantId, key: &K) {
        (**self).remove(tenant_id, key)
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        (**self).clear_tenant(tenant_id)
    }
}

/// In-memory store keeping one map per tenant.
///
/// The per-tenant partitioning makes `list` and `clear_tenant` touch only
/// the tenant's own map, and a key can never collide across tenants.
#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    partitions: RwLock<HashMap<TenantId, HashMap<K, V>>>,
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let partitions = self.partitions.read().ok()?;
        partitions.get(&tenant_id)?.get(key).cloned()
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        if let Ok(mut partitions) = self.partitions.write() {
            partitions.entry(tenant_id).or_default().insert(key, value);
        }
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        match self.partitions.read() {
            Ok(partitions) => partitions
                .get(&tenant_id)
                .map(|p| p.values().cloned().collect())
                .unwrap_or_default(),
            Err(_) => vec![],
        }
    }

    fn remove(&self, tenant_id: TenantId, key: &K) {
        if let Ok(mut partitions) = self.partitions.write() {
            if let Some(partition) = partitions.get_mut(&tenant_id) {
                partition.remove(key);
            }
        }
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut partitions) = self.partitions.write() {
            partitions.remove(&tenant_id);
        }
    }
}
