//! Per-Organization Store Registry
//!
//! One [`AgentPlatformDataStore`] per managed organization, created on first
//! use and dropped when the organization is removed.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::domain::ports::OrgId;
use crate::store::{AgentPlatformDataStore, StoreStats};

/// Registry of per-organization stores
#[derive(Debug, Default)]
pub struct StoreRegistry {
    stores: DashMap<OrgId, Arc<AgentPlatformDataStore>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the store for an organization, creating it if needed
    pub fn get_or_create(&self, org_id: OrgId) -> Arc<AgentPlatformDataStore> {
        // Clone the Arc out so no shard lock outlives this call
        Arc::clone(
            self.stores
                .entry(org_id)
                .or_insert_with(|| {
                    info!(org_id = %org_id, "created agent platform data store");
                    Arc::new(AgentPlatformDataStore::new(org_id))
                })
                .value(),
        )
    }

    pub fn get(&self, org_id: OrgId) -> Option<Arc<AgentPlatformDataStore>> {
        self.stores.get(&org_id).map(|s| Arc::clone(s.value()))
    }

    /// Clear every tier of one organization's store
    pub fn invalidate(&self, org_id: OrgId) -> bool {
        match self.get(org_id) {
            Some(store) => {
                store.invalidate_all();
                true
            }
            None => false,
        }
    }

    /// Drop an organization's store
    pub fn remove(&self, org_id: OrgId) -> Option<Arc<AgentPlatformDataStore>> {
        let removed = self.stores.remove(&org_id).map(|(_, store)| store);
        if removed.is_some() {
            info!(org_id = %org_id, "removed agent platform data store");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Statistics of every store, ordered by organization
    pub fn stats(&self) -> Vec<StoreStats> {
        let mut stats: Vec<StoreStats> = self.stores.iter().map(|r| r.value().stats()).collect();
        stats.sort_by_key(|s| s.org_id);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let registry = StoreRegistry::new();
        let a = registry.get_or_create(OrgId::new(1));
        let b = registry.get_or_create(OrgId::new(1));

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
        assert_eq!(a.org_id(), OrgId::new(1));
    }

    #[test]
    fn test_orgs_are_isolated() {
        let registry = StoreRegistry::new();
        let a = registry.get_or_create(OrgId::new(1));
        let b = registry.get_or_create(OrgId::new(2));

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_stats_ordered_by_org() {
        let registry = StoreRegistry::new();
        registry.get_or_create(OrgId::new(7));
        registry.get_or_create(OrgId::new(2));
        registry.get_or_create(OrgId::new(4));

        let orgs: Vec<OrgId> = registry.stats().iter().map(|s| s.org_id).collect();
        assert_eq!(orgs, [OrgId::new(2), OrgId::new(4), OrgId::new(7)]);
        assert!(registry.stats().iter().all(|s| s.recomputations == 0));
    }

    #[test]
    fn test_invalidate_unknown_org() {
        let registry = StoreRegistry::new();
        assert!(!registry.invalidate(OrgId::new(9)));

        registry.get_or_create(OrgId::new(9));
        assert!(registry.invalidate(OrgId::new(9)));
    }

    #[test]
    fn test_remove() {
        let registry = StoreRegistry::new();
        registry.get_or_create(OrgId::new(3));

        assert!(registry.remove(OrgId::new(3)).is_some());
        assert!(registry.remove(OrgId::new(3)).is_none());
        assert!(registry.is_empty());
    }
}
