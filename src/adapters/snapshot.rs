//! In-Memory Global Model Adapter
//!
//! Implements the `GlobalModel` port over a static topology snapshot. Every
//! named view is computed once when the snapshot is loaded, so queries are
//! plain map lookups returning shared `Arc`s.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::ports::{DomainId, GlobalModel};
use crate::error::Result;
use crate::platform::{Device, Interface, PeerConnection, PlatformData, PlatformDataBuilder};

/// Raw topology records, as stored in a snapshot document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TopologySnapshot {
    pub devices: Vec<Device>,
    pub interfaces: Vec<Interface>,
    pub peer_connections: Vec<PeerConnection>,
}

impl TopologySnapshot {
    /// Parse a snapshot from YAML text
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load a snapshot from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }
}

/// Precomputed views of one topology snapshot
#[derive(Debug)]
pub struct InMemoryGlobalModel {
    all: Arc<PlatformData>,
    all_except_pod: Arc<PlatformData>,
    by_domain_all: HashMap<DomainId, Arc<PlatformData>>,
    by_domain_only_pod: HashMap<DomainId, Arc<PlatformData>>,
    by_domain_except_pod: HashMap<DomainId, Arc<PlatformData>>,
    no_domain: Arc<PlatformData>,
}

struct DomainBuilders {
    kind: &'static str,
    builders: BTreeMap<DomainId, PlatformDataBuilder>,
}

impl DomainBuilders {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            builders: BTreeMap::new(),
        }
    }

    fn entry(&mut self, domain: &DomainId) -> &mut PlatformDataBuilder {
        let kind = self.kind;
        self.builders
            .entry(domain.clone())
            .or_insert_with(|| PlatformDataBuilder::new(format!("{}:{}", kind, domain)))
    }

    fn finalize(self) -> Result<HashMap<DomainId, Arc<PlatformData>>> {
        self.builders
            .into_iter()
            .map(|(domain, builder)| -> Result<(DomainId, Arc<PlatformData>)> {
                Ok((domain, Arc::new(builder.finalize()?)))
            })
            .collect()
    }
}

impl InMemoryGlobalModel {
    /// Build every named view from a snapshot
    pub fn from_snapshot(snapshot: TopologySnapshot) -> Result<Self> {
        let mut all = PlatformDataBuilder::new("all");
        let mut all_except_pod = PlatformDataBuilder::new("all_except_pod");
        let mut no_domain = PlatformDataBuilder::new("no_domain");
        let mut by_domain_all = DomainBuilders::new("domain_all");
        let mut by_domain_only_pod = DomainBuilders::new("domain_only_pod");
        let mut by_domain_except_pod = DomainBuilders::new("domain_except_pod");

        for device in snapshot.devices {
            if let Some(domain) = &device.domain {
                by_domain_all.entry(domain).insert_device(device.clone());
                by_domain_except_pod.entry(domain).insert_device(device.clone());
            }
            all_except_pod.insert_device(device.clone());
            all.insert_device(device);
        }

        for interface in snapshot.interfaces {
            if let Some(domain) = &interface.domain {
                by_domain_all.entry(domain).insert_interface(interface.clone());
                if interface.is_pod {
                    by_domain_only_pod.entry(domain).insert_interface(interface.clone());
                } else {
                    by_domain_except_pod.entry(domain).insert_interface(interface.clone());
                }
            }
            if !interface.is_pod {
                all_except_pod.insert_interface(interface.clone());
            }
            all.insert_interface(interface);
        }

        for peer in snapshot.peer_connections {
            match &peer.domain {
                Some(domain) => {
                    by_domain_all.entry(domain).insert_peer_connection(peer.clone());
                    by_domain_except_pod.entry(domain).insert_peer_connection(peer.clone());
                }
                None => {
                    no_domain.insert_peer_connection(peer.clone());
                }
            }
            all_except_pod.insert_peer_connection(peer.clone());
            all.insert_peer_connection(peer);
        }

        let model = Self {
            all: Arc::new(all.finalize()?),
            all_except_pod: Arc::new(all_except_pod.finalize()?),
            by_domain_all: by_domain_all.finalize()?,
            by_domain_only_pod: by_domain_only_pod.finalize()?,
            by_domain_except_pod: by_domain_except_pod.finalize()?,
            no_domain: Arc::new(no_domain.finalize()?),
        };

        info!(
            version = model.all.version(),
            domains = model.by_domain_all.len(),
            pod_domains = model.by_domain_only_pod.len(),
            "loaded topology snapshot"
        );

        Ok(model)
    }

    /// Domains with at least one object, sorted
    pub fn domains(&self) -> Vec<DomainId> {
        let mut domains: Vec<DomainId> = self.by_domain_all.keys().cloned().collect();
        domains.sort();
        domains
    }
}

impl GlobalModel for InMemoryGlobalModel {
    fn version(&self) -> u64 {
        self.all.version()
    }

    fn all_view(&self) -> Arc<PlatformData> {
        Arc::clone(&self.all)
    }

    fn all_except_pod_view(&self) -> Arc<PlatformData> {
        Arc::clone(&self.all_except_pod)
    }

    fn by_domain_all_view(&self, domain: &DomainId) -> Option<Arc<PlatformData>> {
        self.by_domain_all.get(domain).cloned()
    }

    fn by_domain_only_pod_view(&self, domain: &DomainId) -> Option<Arc<PlatformData>> {
        self.by_domain_only_pod.get(domain).cloned()
    }

    fn by_domain_except_pod_view(&self, domain: &DomainId) -> Option<Arc<PlatformData>> {
        self.by_domain_except_pod.get(domain).cloned()
    }

    fn no_domain_peer_conn_protos(&self) -> Arc<PlatformData> {
        Arc::clone(&self.no_domain)
    }
}

// =============================================================================
// Tests
// =============================================================================
