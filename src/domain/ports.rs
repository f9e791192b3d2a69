//! Domain Ports (DDD Port/Adapter Pattern)
//!
//! Value objects describing agents and their configuration, plus the port
//! traits the engine depends on. Adapters implement these traits to provide
//! concrete topology snapshots and event sinks.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │          GlobalModel │ EventPublisher               │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Adapters (Impls)                    │    │
//! │  │  InMemoryGlobalModel │ LoggingEventPublisher        │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::events::DomainEvent;
use crate::error::Result;
use crate::platform::PlatformData;

/// Wire sentinel meaning "every domain" in a domain filter list.
pub const ALL_DOMAINS: &str = "0";

// =============================================================================
// Value Objects
// =============================================================================

/// Organization (tenant) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgId(pub u32);

impl OrgId {
    /// The organization every single-tenant deployment runs as.
    pub const DEFAULT: OrgId = OrgId(1);

    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Default for OrgId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for OrgId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Domain identifier (one cloud account or cluster in the topology).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(pub String);

impl DomainId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DomainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DomainId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DomainId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Agent group identifier, shared by agents with identical policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GroupId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Kind of collector an agent runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Regular workload or host collector.
    #[default]
    Ordinary,
    /// Dedicated (bare-metal) collector with its own domain set.
    Dedicated,
    /// Tunnel decapsulation collector; never receives platform data.
    TunnelDecapsulation,
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentKind::Ordinary => write!(f, "ordinary"),
            AgentKind::Dedicated => write!(f, "dedicated"),
            AgentKind::TunnelDecapsulation => write!(f, "tunnel_decapsulation"),
        }
    }
}

/// Set of domains an agent group may see.
///
/// Serialized as a plain list; the single-element list `["0"]` stands for
/// every domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<DomainId>", into = "Vec<DomainId>")]
pub enum DomainFilter {
    /// No restriction.
    All,
    /// Only the listed domains, in configuration order.
    Only(Vec<DomainId>),
}

impl DomainFilter {
    /// Build a concrete filter from domain identifiers.
    pub fn only<I, D>(domains: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<DomainId>,
    {
        Self::Only(domains.into_iter().map(Into::into).collect())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, DomainFilter::All)
    }

    /// Listed domains; empty for [`DomainFilter::All`].
    pub fn domains(&self) -> &[DomainId] {
        match self {
            DomainFilter::All => &[],
            DomainFilter::Only(domains) => domains,
        }
    }

    /// Whether the filter grants access to `domain`.
    pub fn contains(&self, domain: &DomainId) -> bool {
        match self {
            DomainFilter::All => true,
            DomainFilter::Only(domains) => domains.contains(domain),
        }
    }
}

impl Default for DomainFilter {
    fn default() -> Self {
        DomainFilter::All
    }
}

impl From<Vec<DomainId>> for DomainFilter {
    fn from(domains: Vec<DomainId>) -> Self {
        if domains.len() == 1 && domains[0].as_str() == ALL_DOMAINS {
            DomainFilter::All
        } else {
            DomainFilter::Only(domains)
        }
    }
}

impl From<DomainFilter> for Vec<DomainId> {
    fn from(filter: DomainFilter) -> Self {
        match filter {
            DomainFilter::All => vec![DomainId::from(ALL_DOMAINS)],
            DomainFilter::Only(domains) => domains,
        }
    }
}

/// Per-group configuration attributes relevant to platform data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentConfig {
    /// Push pod-cluster internal IPs only for the agent's own cluster.
    pub pod_cluster_internal_ip_enabled: bool,
    /// Domains whose platform data the group receives.
    pub domain_filters: DomainFilter,
    /// Domain set used by dedicated agents instead of `domain_filters`.
    pub converted_domains: Vec<DomainId>,
}

impl AgentConfig {
    pub fn new(pod_cluster_internal_ip_enabled: bool, domain_filters: DomainFilter) -> Self {
        Self {
            pod_cluster_internal_ip_enabled,
            domain_filters,
            converted_domains: Vec::new(),
        }
    }

    pub fn with_converted_domains<I, D>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<DomainId>,
    {
        self.converted_domains = domains.into_iter().map(Into::into).collect();
        self
    }
}

/// One collector instance as seen by the agent-management layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescriptor {
    #[serde(default)]
    pub kind: AgentKind,
    pub group_id: GroupId,
    /// Control-plane IP, diagnostics only.
    #[serde(default)]
    pub ctrl_ip: String,
    /// Control-plane MAC, diagnostics only.
    #[serde(default)]
    pub ctrl_mac: String,
    /// Domains of the container cluster the agent runs in.
    #[serde(default)]
    pub pod_domains: Vec<DomainId>,
    /// Group configuration; absent until the agent is fully registered.
    #[serde(default)]
    pub config: Option<AgentConfig>,
}

impl AgentDescriptor {
    pub fn new(group_id: impl Into<String>, ctrl_ip: impl Into<String>) -> Self {
        Self {
            group_id: GroupId::new(group_id),
            ctrl_ip: ctrl_ip.into(),
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: AgentKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_pod_domains<I, D>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<DomainId>,
    {
        self.pod_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Control identity used in log lines and events.
    pub fn identity(&self) -> String {
        if self.ctrl_mac.is_empty() {
            self.ctrl_ip.clone()
        } else {
            format!("{}/{}", self.ctrl_ip, self.ctrl_mac)
        }
    }
}

// =============================================================================
// Global Model Port
// =============================================================================

/// Port onto an immutable snapshot of the global topology model.
///
/// Every query returns an already-finalized view. Implementations must
/// behave as a stable value for the lifetime of the snapshot; a topology
/// change is expressed by installing a new snapshot.
pub trait GlobalModel: Send + Sync {
    /// Content version of the snapshot.
    fn version(&self) -> u64;

    /// Every object of every domain.
    fn all_view(&self) -> Arc<PlatformData>;

    /// Every object except pod interfaces.
    fn all_except_pod_view(&self) -> Arc<PlatformData>;

    /// Every object of one domain.
    fn by_domain_all_view(&self, domain: &DomainId) -> Option<Arc<PlatformData>>;

    /// Pod interfaces of one domain.
    fn by_domain_only_pod_view(&self, domain: &DomainId) -> Option<Arc<PlatformData>>;

    /// Every object of one domain except pod interfaces.
    fn by_domain_except_pod_view(&self, domain: &DomainId) -> Option<Arc<PlatformData>>;

    /// Peer connections that belong to no domain.
    fn no_domain_peer_conn_protos(&self) -> Arc<PlatformData>;
}

// =============================================================================
// Event Publisher Port
// =============================================================================

/// Port for publishing domain events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a domain event.
    async fn publish(&self, event: DomainEvent) -> Result<()>;

    /// Publish multiple events.
    async fn publish_all(&self, events: Vec<DomainEvent>) -> Result<()>;
}

// =============================================================================
// Tests
// =============================================================================
