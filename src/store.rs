//! Agent Platform Data Store
//!
//! Answers "which view does this agent get" for one organization by
//! combining the [`ViewSelector`] with four [`CacheTier`]s.
//!
//! # Resolution Flow
//!
//! ```text
//! classify(agent) ──▶ Skip ─────────────────────────────▶ None
//!        │
//!        ├──────────▶ Direct ──▶ model.all_view() ──────▶ view
//!        │
//!        └──────────▶ Cached(tier, key, recipe)
//!                        │
//!                        ├── tier.get(key) hit ─────────▶ view
//!                        └── miss ──▶ recipe.build(model) ──▶ tier.put_if(key) ──▶ view
//! ```
//!
//! Builds run outside any lock. Two concurrent misses for the same key may
//! both build; the later `put` wins and both callers get an equal view.
//!
//! `invalidate_all` bumps a generation counter before clearing. A build
//! that started under an older generation still answers its caller, but
//! its view is not stored, so a model swap cannot be undone by a slow
//! build finishing after the clear.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::cache::{CacheTier, TierSnapshot};
use crate::domain::ports::{AgentDescriptor, GlobalModel, OrgId};
use crate::error::Result;
use crate::platform::PlatformData;
use crate::selector::{CacheKey, MissingDomain, Selection, TierKind, ViewSelector};

/// Where a resolved view came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionSource {
    /// Global ALL view, never cached.
    Direct,
    /// Served from a tier.
    CacheHit { tier: TierKind, key: CacheKey },
    /// Built on this call and stored in a tier.
    Computed { tier: TierKind, key: CacheKey },
}

impl ResolutionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionSource::Direct => "direct",
            ResolutionSource::CacheHit { .. } => "cache_hit",
            ResolutionSource::Computed { .. } => "computed",
        }
    }
}

/// A view handed to an agent, with diagnostics.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub view: Arc<PlatformData>,
    pub source: ResolutionSource,
    /// Domains skipped while building; only populated for computed views.
    pub missing: Vec<MissingDomain>,
}

impl Resolution {
    pub fn tier(&self) -> Option<TierKind> {
        match &self.source {
            ResolutionSource::Direct => None,
            ResolutionSource::CacheHit { tier, .. } | ResolutionSource::Computed { tier, .. } => {
                Some(*tier)
            }
        }
    }

    pub fn cache_key(&self) -> Option<&CacheKey> {
        match &self.source {
            ResolutionSource::Direct => None,
            ResolutionSource::CacheHit { key, .. } | ResolutionSource::Computed { key, .. } => {
                Some(key)
            }
        }
    }
}

/// Point-in-time store statistics
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub org_id: OrgId,
    pub recomputations: u64,
    pub tiers: Vec<(&'static str, TierSnapshot)>,
}

/// Per-organization memoizing resolver.
pub struct AgentPlatformDataStore {
    org_id: OrgId,
    selector: ViewSelector,
    type1: CacheTier,
    type2: CacheTier,
    type3: CacheTier,
    dedicated: CacheTier,
    recomputations: AtomicU64,
    generation: AtomicU64,
}

impl AgentPlatformDataStore {
    /// Create an empty store for an organization
    pub fn new(org_id: OrgId) -> Self {
        Self {
            org_id,
            selector: ViewSelector::new(),
            type1: CacheTier::new(TierKind::Type1),
            type2: CacheTier::new(TierKind::Type2),
            type3: CacheTier::new(TierKind::Type3),
            dedicated: CacheTier::new(TierKind::Dedicated),
            recomputations: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    pub fn tier(&self, kind: TierKind) -> &CacheTier {
        match kind {
            TierKind::Type1 => &self.type1,
            TierKind::Type2 => &self.type2,
            TierKind::Type3 => &self.type3,
            TierKind::Dedicated => &self.dedicated,
        }
    }

    pub fn tiers(&self) -> [&CacheTier; 4] {
        [&self.type1, &self.type2, &self.type3, &self.dedicated]
    }

    /// Resolve the view for an agent.
    ///
    /// Returns `Ok(None)` for agents that receive no platform data and
    /// `Err(Error::AgentNotReady)` for agents without configuration; neither
    /// touches any tier.
    pub fn resolve(
        &self,
        model: &dyn GlobalModel,
        agent: &AgentDescriptor,
    ) -> Result<Option<Resolution>> {
        let selection = self.selector.classify(agent)?;
        debug!(
            org_id = %self.org_id,
            agent = %agent.identity(),
            group_id = %agent.group_id,
            pod_domains = ?agent.pod_domains,
            "resolving platform data"
        );

        let (tier, key, recipe) = match selection {
            Selection::Skip => {
                debug!(
                    org_id = %self.org_id,
                    agent = %agent.identity(),
                    kind = %agent.kind,
                    "agent kind receives no platform data"
                );
                return Ok(None);
            }
            Selection::Direct => {
                let view = model.all_view();
                debug!(
                    org_id = %self.org_id,
                    agent = %agent.identity(),
                    view = %view,
                    "serving global view"
                );
                return Ok(Some(Resolution {
                    view,
                    source: ResolutionSource::Direct,
                    missing: Vec::new(),
                }));
            }
            Selection::Cached { tier, key, recipe } => (tier, key, recipe),
        };

        let cache = self.tier(tier);
        if let Some(view) = cache.get(&key) {
            return Ok(Some(Resolution {
                view,
                source: ResolutionSource::CacheHit { tier, key },
                missing: Vec::new(),
            }));
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let built = recipe.build(tier, model)?;
        self.recomputations.fetch_add(1, Ordering::Relaxed);
        let view = Arc::new(built.view);
        let stored = cache.put_if(key.clone(), Arc::clone(&view), || {
            self.generation.load(Ordering::SeqCst) == generation
        });

        debug!(
            org_id = %self.org_id,
            tier = %tier,
            key = %key,
            view = %view,
            missing = built.missing.len(),
            stored,
            "computed platform data"
        );

        Ok(Some(Resolution {
            view,
            source: ResolutionSource::Computed { tier, key },
            missing: built.missing,
        }))
    }

    /// Clear all four tiers; the next resolve per key recomputes.
    ///
    /// Builds already in flight are not stored.
    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        for tier in self.tiers() {
            tier.clear();
        }
        info!(org_id = %self.org_id, "agent platform data caches invalidated");
    }

    /// Number of views built since creation
    pub fn recomputations(&self) -> u64 {
        self.recomputations.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            org_id: self.org_id,
            recomputations: self.recomputations(),
            tiers: self.tiers().iter().map(|t| (t.name(), t.snapshot())).collect(),
        }
    }

    /// Log every cached key at debug level
    pub fn dump(&self) {
        for tier in self.tiers() {
            for key in tier.keys() {
                if let Some(view) = tier.peek(&key) {
                    debug!(
                        org_id = %self.org_id,
                        tier = %tier.name(),
                        key = %key,
                        view = %view,
                        "cached platform data"
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for AgentPlatformDataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentPlatformDataStore")
            .field("org_id", &self.org_id)
            .field("type1", &self.type1)
            .field("type2", &self.type2)
            .field("type3", &self.type3)
            .field("dedicated", &self.dedicated)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryGlobalModel, TopologySnapshot};
    use crate::domain::ports::{AgentConfig, AgentKind, DomainFilter, DomainId};
    use crate::error::Error;
    use assert_matches::assert_matches;
    use std::thread;

    const SNAPSHOT: &str = r#"
devices:
  - { id: 1, name: vm-1, domain: d1 }
  - { id: 2, name: vm-2, domain: d2 }
interfaces:
  - { id: 10, deviceId: 1, domain: d1 }
  - { id: 11, deviceId: 1, domain: d1, isPod: true }
  - { id: 20, deviceId: 2, domain: d2 }
  - { id: 30, deviceId: 3, domain: p1, isPod: true }
peerConnections:
  - { id: 100, localNetwork: 1, remoteNetwork: 2 }
"#;

    fn model() -> InMemoryGlobalModel {
        InMemoryGlobalModel::from_snapshot(TopologySnapshot::from_yaml(SNAPSHOT).unwrap()).unwrap()
    }

    fn agent(internal_ip: bool, filters: DomainFilter) -> AgentDescriptor {
        AgentDescriptor::new("g-1", "10.0.0.1")
            .with_pod_domains(["p1"])
            .with_config(AgentConfig::new(internal_ip, filters))
    }

    #[test]
    fn test_skip_touches_no_tier() {
        let store = AgentPlatformDataStore::new(OrgId::DEFAULT);
        let agent =
            AgentDescriptor::new("g-1", "10.0.0.1").with_kind(AgentKind::TunnelDecapsulation);

        assert!(store.resolve(&model(), &agent).unwrap().is_none());
        assert!(store.tiers().iter().all(|t| t.is_empty()));
        assert_eq!(store.recomputations(), 0);
    }

    #[test]
    fn test_not_ready_touches_no_tier() {
        let store = AgentPlatformDataStore::new(OrgId::DEFAULT);
        let agent = AgentDescriptor::new("g-1", "10.0.0.1");

        assert_matches!(store.resolve(&model(), &agent), Err(Error::AgentNotReady { .. }));
        assert!(store.tiers().iter().all(|t| t.is_empty()));
    }

    #[test]
    fn test_direct_is_never_cached() {
        let store = AgentPlatformDataStore::new(OrgId::DEFAULT);
        let model = model();

        let resolution = store
            .resolve(&model, &agent(false, DomainFilter::All))
            .unwrap()
            .unwrap();

        assert_eq!(resolution.source, ResolutionSource::Direct);
        assert!(Arc::ptr_eq(&resolution.view, &model.all_view()));
        assert!(resolution.tier().is_none());
        assert!(store.tiers().iter().all(|t| t.is_empty()));
    }

    #[test]
    fn test_miss_then_hit() {
        let store = AgentPlatformDataStore::new(OrgId::DEFAULT);
        let model = model();
        let agent = agent(false, DomainFilter::only(["d1"]));

        let first = store.resolve(&model, &agent).unwrap().unwrap();
        assert_matches!(first.source, ResolutionSource::Computed { tier: TierKind::Type1, .. });
        assert_eq!(first.cache_key().unwrap().as_str(), "g-1");

        let second = store.resolve(&model, &agent).unwrap().unwrap();
        assert_matches!(second.source, ResolutionSource::CacheHit { tier: TierKind::Type1, .. });
        assert!(Arc::ptr_eq(&first.view, &second.view));
        assert_eq!(store.recomputations(), 1);
    }

    #[test]
    fn test_invalidate_forces_recompute() {
        let store = AgentPlatformDataStore::new(OrgId::DEFAULT);
        let model = model();
        let agent = agent(true, DomainFilter::All);

        let before = store.resolve(&model, &agent).unwrap().unwrap();
        store.invalidate_all();
        assert!(store.tiers().iter().all(|t| t.is_empty()));

        let after = store.resolve(&model, &agent).unwrap().unwrap();
        assert_matches!(after.source, ResolutionSource::Computed { tier: TierKind::Type2, .. });
        assert_eq!(*before.view, *after.view);
        assert_eq!(store.recomputations(), 2);
    }

    #[test]
    fn test_invalidate_empty_store_is_noop() {
        let store = AgentPlatformDataStore::new(OrgId::DEFAULT);
        store.invalidate_all();
        store.invalidate_all();
        assert!(store.tiers().iter().all(|t| t.is_empty()));
    }

    #[test]
    fn test_tiers_are_isolated() {
        let store = AgentPlatformDataStore::new(OrgId::DEFAULT);
        let model = model();

        store
            .resolve(&model, &agent(false, DomainFilter::only(["d1"])))
            .unwrap();
        store
            .resolve(&model, &agent(true, DomainFilter::only(["d1"])))
            .unwrap();

        assert_eq!(store.tier(TierKind::Type1).keys(), vec![CacheKey::from("g-1")]);
        assert_eq!(store.tier(TierKind::Type3).keys(), vec![CacheKey::from("g-1+p1")]);
        assert!(store.tier(TierKind::Type2).is_empty());
        assert!(store.tier(TierKind::Dedicated).is_empty());
    }

    #[test]
    fn test_missing_domain_is_reported() {
        let store = AgentPlatformDataStore::new(OrgId::DEFAULT);
        let resolution = store
            .resolve(&model(), &agent(false, DomainFilter::only(["d1", "nope"])))
            .unwrap()
            .unwrap();

        assert_eq!(resolution.missing.len(), 1);
        assert_eq!(resolution.missing[0].domain.as_str(), "nope");
        assert!(resolution.view.has_interface(10));
    }

    #[test]
    fn test_concurrent_misses_agree() {
        let store = Arc::new(AgentPlatformDataStore::new(OrgId::DEFAULT));
        let model = Arc::new(model());
        let agent = agent(true, DomainFilter::only(["d1"]));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let model = Arc::clone(&model);
                let agent = agent.clone();
                thread::spawn(move || store.resolve(model.as_ref(), &agent).unwrap().unwrap())
            })
            .collect();

        let views: Vec<Arc<PlatformData>> = handles
            .into_iter()
            .map(|h| h.join().expect("Thread panicked").view)
            .collect();

        assert!(views.windows(2).all(|w| *w[0] == *w[1]));
        assert_eq!(store.tier(TierKind::Type3).len(), 1);
        assert!(store.recomputations() >= 1);
    }

    /// Model that invalidates the store while a view is being built
    struct InvalidatingModel {
        inner: InMemoryGlobalModel,
        store: Arc<AgentPlatformDataStore>,
    }

    impl GlobalModel for InvalidatingModel {
        fn version(&self) -> u64 {
            self.inner.version()
        }

        fn all_view(&self) -> Arc<PlatformData> {
            self.inner.all_view()
        }

        fn all_except_pod_view(&self) -> Arc<PlatformData> {
            self.inner.all_except_pod_view()
        }

        fn by_domain_all_view(&self, domain: &DomainId) -> Option<Arc<PlatformData>> {
            self.inner.by_domain_all_view(domain)
        }

        fn by_domain_only_pod_view(&self, domain: &DomainId) -> Option<Arc<PlatformData>> {
            self.inner.by_domain_only_pod_view(domain)
        }

        fn by_domain_except_pod_view(&self, domain: &DomainId) -> Option<Arc<PlatformData>> {
            self.inner.by_domain_except_pod_view(domain)
        }

        fn no_domain_peer_conn_protos(&self) -> Arc<PlatformData> {
            self.store.invalidate_all();
            self.inner.no_domain_peer_conn_protos()
        }
    }

    #[test]
    fn test_build_racing_invalidation_is_not_stored() {
        let store = Arc::new(AgentPlatformDataStore::new(OrgId::DEFAULT));
        let racing = InvalidatingModel {
            inner: model(),
            store: Arc::clone(&store),
        };
        let agent = agent(false, DomainFilter::only(["d1"]));

        let stale = store.resolve(&racing, &agent).unwrap().unwrap();
        assert_matches!(stale.source, ResolutionSource::Computed { tier: TierKind::Type1, .. });
        assert!(stale.view.has_interface(10));
        assert!(store.tier(TierKind::Type1).is_empty());

        let fresh = store.resolve(&model(), &agent).unwrap().unwrap();
        assert_matches!(fresh.source, ResolutionSource::Computed { tier: TierKind::Type1, .. });
        assert_eq!(store.tier(TierKind::Type1).len(), 1);
        assert_eq!(store.recomputations(), 2);
    }

    #[test]
    fn test_stats() {
        let store = AgentPlatformDataStore::new(OrgId::new(4));
        store
            .resolve(&model(), &agent(false, DomainFilter::only(["d2"])))
            .unwrap();
        store.dump();

        let stats = store.stats();
        assert_eq!(stats.org_id, OrgId::new(4));
        assert_eq!(stats.recomputations, 1);
        let names: Vec<&str> = stats.tiers.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, ["Type1", "Type2", "Type3", "Dedicated"]);
        assert_eq!(stats.tiers[0].1.entries, 1);
    }
}
