//! Platform Data Views
//!
//! A view is the slice of the topology model handed to one agent: devices,
//! interfaces and peer-connection protocols, keyed by object id.
//!
//! Views are built in two phases:
//!
//! ```text
//! PlatformDataBuilder ── merge ───────────────────┐
//!      (mutable)      ── merge_interfaces ────────┼──▶ finalize() ──▶ PlatformData
//!                     ── merge_peer_conn_protos ──┘    (consumes)      (immutable)
//! ```
//!
//! `finalize` consumes the builder, so a view is finalized exactly once and
//! never mutated afterwards. The finalized view carries a deterministic
//! serialized payload and a content version derived from it.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::ports::DomainId;
use crate::error::Result;

// =============================================================================
// Topology Records
// =============================================================================

/// A monitored device (VM, host, pod node, gateway, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub domain: Option<DomainId>,
}

/// A network interface attached to a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    pub id: u64,
    pub device_id: u64,
    #[serde(default)]
    pub mac: String,
    #[serde(default)]
    pub ips: Vec<String>,
    #[serde(default)]
    pub domain: Option<DomainId>,
    /// Interface belongs to a pod or container service.
    #[serde(default)]
    pub is_pod: bool,
}

/// A peer connection between two networks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerConnection {
    pub id: u64,
    pub local_network: u64,
    pub remote_network: u64,
    #[serde(default)]
    pub domain: Option<DomainId>,
}

// =============================================================================
// Builder
// =============================================================================

/// Mutable accumulator for a view under construction.
#[derive(Debug, Clone, Default)]
pub struct PlatformDataBuilder {
    kind: String,
    devices: BTreeMap<u64, Device>,
    interfaces: BTreeMap<u64, Interface>,
    peer_connections: BTreeMap<u64, PeerConnection>,
}

impl PlatformDataBuilder {
    /// Create an empty builder tagged with a diagnostic kind label.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    pub fn insert_device(&mut self, device: Device) -> &mut Self {
        self.devices.insert(device.id, device);
        self
    }

    pub fn insert_interface(&mut self, interface: Interface) -> &mut Self {
        self.interfaces.insert(interface.id, interface);
        self
    }

    pub fn insert_peer_connection(&mut self, peer: PeerConnection) -> &mut Self {
        self.peer_connections.insert(peer.id, peer);
        self
    }

    /// Full merge: devices, interfaces and peer connections.
    pub fn merge(&mut self, other: &PlatformData) -> &mut Self {
        self.extend_devices(other);
        self.extend_interfaces(other);
        self.extend_peer_connections(other);
        self
    }

    /// Interface-only overlay.
    pub fn merge_interfaces(&mut self, other: &PlatformData) -> &mut Self {
        self.extend_interfaces(other);
        self
    }

    /// Peer-connection-only overlay.
    pub fn merge_peer_conn_protos(&mut self, other: &PlatformData) -> &mut Self {
        self.extend_peer_connections(other);
        self
    }

    fn extend_devices(&mut self, other: &PlatformData) {
        self.devices
            .extend(other.devices.iter().map(|(id, d)| (*id, d.clone())));
    }

    fn extend_interfaces(&mut self, other: &PlatformData) {
        self.interfaces
            .extend(other.interfaces.iter().map(|(id, i)| (*id, i.clone())));
    }

    fn extend_peer_connections(&mut self, other: &PlatformData) {
        self.peer_connections
            .extend(other.peer_connections.iter().map(|(id, p)| (*id, p.clone())));
    }

    /// Serialize the accumulated content and freeze it into a view.
    pub fn finalize(self) -> Result<PlatformData> {
        let payload = serde_json::to_vec(&PayloadRef {
            devices: self.devices.values().collect(),
            interfaces: self.interfaces.values().collect(),
            peer_connections: self.peer_connections.values().collect(),
        })?;
        let version = content_version(&payload);

        Ok(PlatformData {
            kind: self.kind,
            devices: self.devices,
            interfaces: self.interfaces,
            peer_connections: self.peer_connections,
            version,
            payload: Bytes::from(payload),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PayloadRef<'a> {
    devices: Vec<&'a Device>,
    interfaces: Vec<&'a Interface>,
    peer_connections: Vec<&'a PeerConnection>,
}

/// Leading 8 bytes of the payload's SHA-256 digest, big endian
fn content_version(payload: &[u8]) -> u64 {
    let digest = Sha256::digest(payload);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

// =============================================================================
// Finalized View
// =============================================================================

/// Finalized, immutable platform-data view.
///
/// Equality compares content only; the kind label is diagnostic.
#[derive(Debug, Clone)]
pub struct PlatformData {
    kind: String,
    devices: BTreeMap<u64, Device>,
    interfaces: BTreeMap<u64, Interface>,
    peer_connections: BTreeMap<u64, PeerConnection>,
    version: u64,
    payload: Bytes,
}

impl PlatformData {
    /// Diagnostic kind label.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Content version, identical for identical content.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Serialized payload pushed to agents.
    pub fn payload(&self) -> Bytes {
        self.payload.clone()
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &Interface> {
        self.interfaces.values()
    }

    pub fn peer_connections(&self) -> impl Iterator<Item = &PeerConnection> {
        self.peer_connections.values()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn interface_count(&self) -> usize {
        self.interfaces.len()
    }

    pub fn peer_connection_count(&self) -> usize {
        self.peer_connections.len()
    }

    pub fn has_interface(&self, id: u64) -> bool {
        self.interfaces.contains_key(&id)
    }

    pub fn has_device(&self, id: u64) -> bool {
        self.devices.contains_key(&id)
    }

    pub fn has_peer_connection(&self, id: u64) -> bool {
        self.peer_connections.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty() && self.interfaces.is_empty() && self.peer_connections.is_empty()
    }
}

impl PartialEq for PlatformData {
    fn eq(&self, other: &Self) -> bool {
        self.devices == other.devices
            && self.interfaces == other.interfaces
            && self.peer_connections == other.peer_connections
    }
}

impl Eq for PlatformData {}

impl std::fmt::Display for PlatformData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}(version={:016x}, devices={}, interfaces={}, peer_connections={})",
            self.kind,
            self.version,
            self.devices.len(),
            self.interfaces.len(),
            self.peer_connections.len()
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: u64) -> Device {
        Device {
            id,
            name: format!("dev-{}", id),
            domain: Some(DomainId::from("d1")),
        }
    }

    fn interface(id: u64, is_pod: bool) -> Interface {
        Interface {
            id,
            device_id: 1,
            mac: String::new(),
            ips: vec![format!("10.0.0.{}", id)],
            domain: Some(DomainId::from("d1")),
            is_pod,
        }
    }

    fn peer(id: u64) -> PeerConnection {
        PeerConnection {
            id,
            local_network: 1,
            remote_network: 2,
            domain: None,
        }
    }

    fn full_view() -> PlatformData {
        let mut builder = PlatformDataBuilder::new("source");
        builder
            .insert_device(device(1))
            .insert_interface(interface(10, false))
            .insert_interface(interface(11, true))
            .insert_peer_connection(peer(100));
        builder.finalize().unwrap()
    }

    #[test]
    fn test_full_merge() {
        let source = full_view();
        let mut builder = PlatformDataBuilder::new("Type1");
        builder.merge(&source);
        let view = builder.finalize().unwrap();

        assert_eq!(view, source);
        assert_eq!(view.kind(), "Type1");
        assert_eq!(view.version(), source.version());
    }

    #[test]
    fn test_merge_interfaces_only() {
        let source = full_view();
        let mut builder = PlatformDataBuilder::new("Type2");
        builder.merge_interfaces(&source);
        let view = builder.finalize().unwrap();

        assert_eq!(view.interface_count(), 2);
        assert_eq!(view.device_count(), 0);
        assert_eq!(view.peer_connection_count(), 0);
    }

    #[test]
    fn test_merge_peer_conn_protos_only() {
        let source = full_view();
        let mut builder = PlatformDataBuilder::new("Type3");
        builder.merge_peer_conn_protos(&source);
        let view = builder.finalize().unwrap();

        assert!(view.has_peer_connection(100));
        assert_eq!(view.interface_count(), 0);
        assert_eq!(view.device_count(), 0);
    }

    #[test]
    fn test_empty_view_is_finalized() {
        let view = PlatformDataBuilder::new("Type1").finalize().unwrap();
        assert!(view.is_empty());
        assert!(!view.payload().is_empty());
    }

    #[test]
    fn test_version_is_sha256_prefix_of_payload() {
        let view = PlatformDataBuilder::new("Type1").finalize().unwrap();
        assert_eq!(
            &view.payload()[..],
            br#"{"devices":[],"interfaces":[],"peerConnections":[]}"#
        );
        assert_eq!(view.version(), 0x70fe_2956_6fdf_1b69);
    }

    #[test]
    fn test_version_tracks_content() {
        let a = full_view();
        let b = full_view();
        assert_eq!(a.version(), b.version());
        assert_eq!(a.payload(), b.payload());

        let mut builder = PlatformDataBuilder::new("source");
        builder.merge(&a).insert_device(device(2));
        let c = builder.finalize().unwrap();
        assert_ne!(a.version(), c.version());
        assert_ne!(a, c);
    }

    #[test]
    fn test_merge_order_independent_for_disjoint_sources() {
        let mut left = PlatformDataBuilder::new("x");
        left.insert_interface(interface(1, false));
        let left = left.finalize().unwrap();

        let mut right = PlatformDataBuilder::new("y");
        right.insert_interface(interface(2, true));
        let right = right.finalize().unwrap();

        let mut ab = PlatformDataBuilder::new("ab");
        ab.merge(&left).merge(&right);
        let mut ba = PlatformDataBuilder::new("ba");
        ba.merge(&right).merge(&left);

        assert_eq!(ab.finalize().unwrap(), ba.finalize().unwrap());
    }

    #[test]
    fn test_display() {
        let view = full_view();
        let text = view.to_string();
        assert!(text.starts_with("source(version="));
        assert!(text.contains("interfaces=2"));
    }
}
