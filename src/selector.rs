//! View Selector
//!
//! Decides which slice of the global model an agent receives, which cache
//! tier memoizes it and under which key, and how to build it.
//!
//! # Decision Table
//!
//! ```text
//! agent kind == tunnel decapsulation          → Skip
//! internal IP │ filters │ agent kind │ outcome
//! ────────────┼─────────┼────────────┼───────────────────────────────────
//!    off      │  ALL    │ any        │ Direct (ALL view)
//!    off      │  list   │ any        │ Type1     key=group
//!    on       │  ALL    │ dedicated  │ Direct (ALL view)
//!    on       │  ALL    │ other      │ Type2     key=group+pods
//!    on       │  list   │ dedicated  │ Dedicated key=group
//!    on       │  list   │ other      │ Type3     key=group+pods
//! ```
//!
//! ```text
//! Type1      BY-DOMAIN-ALL(filters) + NO-DOMAIN
//! Type2      ALL-EXCEPT-POD + pod interfaces
//! Dedicated  BY-DOMAIN-ALL(converted) + NO-DOMAIN
//! Type3      EXCEPT-POD(filters) + pods + NO-DOMAIN
//! ```
//!
//! Classification is pure. Building a view only reads the model.

use std::sync::Arc;

use tracing::warn;

use crate::domain::ports::{
    AgentDescriptor, AgentKind, DomainFilter, DomainId, GlobalModel, GroupId,
};
use crate::error::{Error, Result};
use crate::platform::{PlatformData, PlatformDataBuilder};

// =============================================================================
// Tiers and Keys
// =============================================================================

/// The four cache tiers, one per cached branch of the decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierKind {
    /// Domain list, all cluster internal IPs
    Type1,
    /// All domains, own cluster internal IPs
    Type2,
    /// Domain list, own cluster internal IPs
    Type3,
    /// Dedicated agents with a domain list and own cluster internal IPs
    Dedicated,
}

impl TierKind {
    pub const ALL: [TierKind; 4] = [
        TierKind::Type1,
        TierKind::Type2,
        TierKind::Type3,
        TierKind::Dedicated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TierKind::Type1 => "Type1",
            TierKind::Type2 => "Type2",
            TierKind::Type3 => "Type3",
            TierKind::Dedicated => "Dedicated",
        }
    }
}

impl std::fmt::Display for TierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache key inside one tier.
///
/// Pod domains are joined in the order the agent reports them, so the same
/// set in a different order is a different key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key shared by every agent of a group.
    pub fn group(group_id: &GroupId) -> Self {
        Self(group_id.as_str().to_string())
    }

    /// Key shared by agents of a group running in the same pod domains.
    pub fn group_with_pods(group_id: &GroupId, pod_domains: &[DomainId]) -> Self {
        let pods: Vec<&str> = pod_domains.iter().map(DomainId::as_str).collect();
        Self(format!("{}+{}", group_id, pods.join("+")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// =============================================================================
// Recipes
// =============================================================================

/// Per-domain view family of the global model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewFamily {
    ByDomainAll,
    ByDomainOnlyPod,
    ByDomainExceptPod,
}

impl std::fmt::Display for ViewFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewFamily::ByDomainAll => write!(f, "by_domain_all"),
            ViewFamily::ByDomainOnlyPod => write!(f, "by_domain_only_pod"),
            ViewFamily::ByDomainExceptPod => write!(f, "by_domain_except_pod"),
        }
    }
}

/// A domain that was referenced but has no entry in a view family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDomain {
    pub domain: DomainId,
    pub family: ViewFamily,
}

/// Ordered merge recipe for building a cached view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipe {
    /// Full merge of BY-DOMAIN-ALL for each domain, then NO-DOMAIN peer connections.
    DomainsAll { domains: Vec<DomainId> },
    /// ALL-EXCEPT-POD with the pod interfaces of each pod domain overlaid.
    PodOverlay { pod_domains: Vec<DomainId> },
    /// BY-DOMAIN-EXCEPT-POD for each filter, then pod data of each pod
    /// domain (interfaces only where the filter already covers the domain),
    /// then NO-DOMAIN peer connections.
    FilteredPod {
        filters: Vec<DomainId>,
        pod_domains: Vec<DomainId>,
    },
}

/// Result of running a recipe.
#[derive(Debug)]
pub struct Built {
    pub view: PlatformData,
    pub missing: Vec<MissingDomain>,
}

#[derive(Clone, Copy)]
enum MergeMode {
    Full,
    InterfacesOnly,
}

struct Accumulator<'a> {
    tier: TierKind,
    model: &'a dyn GlobalModel,
    builder: PlatformDataBuilder,
    missing: Vec<MissingDomain>,
}

impl<'a> Accumulator<'a> {
    fn new(tier: TierKind, model: &'a dyn GlobalModel) -> Self {
        Self {
            tier,
            model,
            builder: PlatformDataBuilder::new(tier.as_str()),
            missing: Vec::new(),
        }
    }

    fn lookup(&self, family: ViewFamily, domain: &DomainId) -> Option<Arc<PlatformData>> {
        match family {
            ViewFamily::ByDomainAll => self.model.by_domain_all_view(domain),
            ViewFamily::ByDomainOnlyPod => self.model.by_domain_only_pod_view(domain),
            ViewFamily::ByDomainExceptPod => self.model.by_domain_except_pod_view(domain),
        }
    }

    fn add(&mut self, family: ViewFamily, domain: &DomainId, mode: MergeMode) {
        let Some(data) = self.lookup(family, domain) else {
            warn!(
                tier = %self.tier,
                domain = %domain,
                family = %family,
                "domain has no platform data"
            );
            self.missing.push(MissingDomain {
                domain: domain.clone(),
                family,
            });
            return;
        };
        match mode {
            MergeMode::Full => self.builder.merge(&data),
            MergeMode::InterfacesOnly => self.builder.merge_interfaces(&data),
        };
    }

    fn finish(self) -> Result<Built> {
        Ok(Built {
            view: self.builder.finalize()?,
            missing: self.missing,
        })
    }
}

impl Recipe {
    /// Execute the recipe against a model snapshot and finalize the view.
    ///
    /// Missing domains are skipped and reported in [`Built::missing`].
    pub fn build(&self, tier: TierKind, model: &dyn GlobalModel) -> Result<Built> {
        let mut acc = Accumulator::new(tier, model);

        match self {
            Recipe::DomainsAll { domains } => {
                for domain in domains {
                    acc.add(ViewFamily::ByDomainAll, domain, MergeMode::Full);
                }
                acc.builder.merge_peer_conn_protos(&model.no_domain_peer_conn_protos());
            }
            Recipe::PodOverlay { pod_domains } => {
                acc.builder.merge(&model.all_except_pod_view());
                for domain in pod_domains {
                    acc.add(ViewFamily::ByDomainOnlyPod, domain, MergeMode::InterfacesOnly);
                }
            }
            Recipe::FilteredPod {
                filters,
                pod_domains,
            } => {
                for domain in filters {
                    acc.add(ViewFamily::ByDomainExceptPod, domain, MergeMode::Full);
                }
                for domain in pod_domains {
                    let mode = if filters.contains(domain) {
                        MergeMode::InterfacesOnly
                    } else {
                        MergeMode::Full
                    };
                    acc.add(ViewFamily::ByDomainOnlyPod, domain, mode);
                }
                acc.builder.merge_peer_conn_protos(&model.no_domain_peer_conn_protos());
            }
        }

        acc.finish()
    }
}

// =============================================================================
// Selector
// =============================================================================

/// Outcome of classifying an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The agent receives no platform data.
    Skip,
    /// The agent receives the global ALL view as-is, without caching.
    Direct,
    /// The agent receives a view memoized in `tier` under `key`.
    Cached {
        tier: TierKind,
        key: CacheKey,
        recipe: Recipe,
    },
}

/// Pure decision procedure mapping an agent to its view.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewSelector;

impl ViewSelector {
    pub fn new() -> Self {
        Self
    }

    /// Classify an agent.
    ///
    /// Tunnel decapsulation agents are skipped before anything else is
    /// inspected. Any other agent without configuration is not ready.
    pub fn classify(&self, agent: &AgentDescriptor) -> Result<Selection> {
        if agent.kind == AgentKind::TunnelDecapsulation {
            return Ok(Selection::Skip);
        }

        let config = agent.config.as_ref().ok_or_else(|| Error::AgentNotReady {
            agent: agent.identity(),
        })?;
        let dedicated = agent.kind == AgentKind::Dedicated;

        let selection = match (config.pod_cluster_internal_ip_enabled, &config.domain_filters) {
            (false, DomainFilter::All) => Selection::Direct,
            (false, DomainFilter::Only(filters)) => Selection::Cached {
                tier: TierKind::Type1,
                key: CacheKey::group(&agent.group_id),
                recipe: Recipe::DomainsAll {
                    domains: filters.clone(),
                },
            },
            (true, DomainFilter::All) if dedicated => Selection::Direct,
            (true, DomainFilter::All) => Selection::Cached {
                tier: TierKind::Type2,
                key: CacheKey::group_with_pods(&agent.group_id, &agent.pod_domains),
                recipe: Recipe::PodOverlay {
                    pod_domains: agent.pod_domains.clone(),
                },
            },
            (true, DomainFilter::Only(_)) if dedicated => Selection::Cached {
                tier: TierKind::Dedicated,
                key: CacheKey::group(&agent.group_id),
                recipe: Recipe::DomainsAll {
                    domains: config.converted_domains.clone(),
                },
            },
            (true, DomainFilter::Only(filters)) => Selection::Cached {
                tier: TierKind::Type3,
                key: CacheKey::group_with_pods(&agent.group_id, &agent.pod_domains),
                recipe: Recipe::FilteredPod {
                    filters: filters.clone(),
                    pod_domains: agent.pod_domains.clone(),
                },
            },
        };

        Ok(selection)
    }
}

// =============================================================================
// Tests
// =============================================================================
