//! Input Documents
//!
//! YAML documents read by the binary: the agent list and the topology
//! snapshot.
//!
//! ```yaml
//! orgId: 1
//! agents:
//!   - groupId: g-1
//!     ctrlIp: 10.0.0.1
//!     podDomains: [p1]
//!     config:
//!       podClusterInternalIpEnabled: true
//!       domainFilters: ["0"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::ports::{AgentDescriptor, OrgId};
use crate::error::{Error, Result};

pub use crate::adapters::TopologySnapshot;

/// Agents to resolve, optionally pinned to an organization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentList {
    #[serde(default)]
    pub org_id: Option<OrgId>,
    #[serde(default)]
    pub agents: Vec<AgentDescriptor>,
}

impl AgentList {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let list: Self = serde_yaml::from_str(text)?;
        list.validate()?;
        Ok(list)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading agent list");
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Reject agents without a group
    fn validate(&self) -> Result<()> {
        if let Some(index) = self.agents.iter().position(|a| a.group_id.as_str().is_empty()) {
            return Err(Error::Config(format!("agent #{} has an empty groupId", index)));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
