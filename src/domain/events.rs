//! Domain Events
//!
//! Immutable records of what happened while distributing platform data:
//! which view an agent received, why an agent received nothing, which
//! domains were missing from the model, and when caches were invalidated.
//!
//! # Example
//!
//! ```ignore
//! let event = DomainEvent::caches_invalidated(OrgId::DEFAULT, model.version());
//! event_publisher.publish(event).await?;
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ports::{AgentDescriptor, OrgId};

/// Domain event representing a significant occurrence in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    /// An agent received a platform-data view.
    PlatformDataResolved {
        org_id: OrgId,
        agent: String,
        group_id: String,
        /// `direct`, `cache_hit` or `computed`
        source: String,
        tier: Option<String>,
        cache_key: Option<String>,
        version: u64,
        timestamp: DateTime<Utc>,
    },

    /// An agent kind that never receives platform data.
    PlatformDataSkipped {
        org_id: OrgId,
        agent: String,
        agent_kind: String,
        timestamp: DateTime<Utc>,
    },

    /// An agent could not be served because its configuration is missing.
    AgentNotReady {
        org_id: OrgId,
        agent: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A referenced domain had no data in the queried view family.
    DomainDataMissing {
        org_id: OrgId,
        tier: String,
        cache_key: String,
        domain: String,
        family: String,
        timestamp: DateTime<Utc>,
    },

    /// All cache tiers of an organization were cleared.
    CachesInvalidated {
        org_id: OrgId,
        model_version: u64,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    pub fn platform_data_resolved(
        org_id: OrgId,
        agent: &AgentDescriptor,
        source: &str,
        tier: Option<String>,
        cache_key: Option<String>,
        version: u64,
    ) -> Self {
        DomainEvent::PlatformDataResolved {
            org_id,
            agent: agent.identity(),
            group_id: agent.group_id.to_string(),
            source: source.to_string(),
            tier,
            cache_key,
            version,
            timestamp: Utc::now(),
        }
    }

    pub fn domain_data_missing(
        org_id: OrgId,
        tier: impl Into<String>,
        cache_key: impl Into<String>,
        domain: impl Into<String>,
        family: impl Into<String>,
    ) -> Self {
        DomainEvent::DomainDataMissing {
            org_id,
            tier: tier.into(),
            cache_key: cache_key.into(),
            domain: domain.into(),
            family: family.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn platform_data_skipped(org_id: OrgId, agent: &AgentDescriptor) -> Self {
        DomainEvent::PlatformDataSkipped {
            org_id,
            agent: agent.identity(),
            agent_kind: agent.kind.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn agent_not_ready(
        org_id: OrgId,
        agent: &AgentDescriptor,
        reason: impl Into<String>,
    ) -> Self {
        DomainEvent::AgentNotReady {
            org_id,
            agent: agent.identity(),
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn caches_invalidated(org_id: OrgId, model_version: u64) -> Self {
        DomainEvent::CachesInvalidated {
            org_id,
            model_version,
            timestamp: Utc::now(),
        }
    }

    /// Get the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::PlatformDataResolved { .. } => "PlatformDataResolved",
            DomainEvent::PlatformDataSkipped { .. } => "PlatformDataSkipped",
            DomainEvent::AgentNotReady { .. } => "AgentNotReady",
            DomainEvent::DomainDataMissing { .. } => "DomainDataMissing",
            DomainEvent::CachesInvalidated { .. } => "CachesInvalidated",
        }
    }

    /// Get the organization the event belongs to.
    pub fn org_id(&self) -> OrgId {
        match self {
            DomainEvent::PlatformDataResolved { org_id, .. }
            | DomainEvent::PlatformDataSkipped { org_id, .. }
            | DomainEvent::AgentNotReady { org_id, .. }
            | DomainEvent::DomainDataMissing { org_id, .. }
            | DomainEvent::CachesInvalidated { org_id, .. } => *org_id,
        }
    }

    /// Get the agent identity if applicable.
    pub fn agent(&self) -> Option<&str> {
        match self {
            DomainEvent::PlatformDataResolved { agent, .. }
            | DomainEvent::PlatformDataSkipped { agent, .. }
            | DomainEvent::AgentNotReady { agent, .. } => Some(agent),
            _ => None,
        }
    }

    /// Get the event timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::PlatformDataResolved { timestamp, .. }
            | DomainEvent::PlatformDataSkipped { timestamp, .. }
            | DomainEvent::AgentNotReady { timestamp, .. }
            | DomainEvent::DomainDataMissing { timestamp, .. }
            | DomainEvent::CachesInvalidated { timestamp, .. } => *timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::AgentKind;

    #[test]
    fn test_event_type_and_agent() {
        let agent =
            AgentDescriptor::new("g-1", "10.0.0.1").with_kind(AgentKind::TunnelDecapsulation);
        let event = DomainEvent::platform_data_skipped(OrgId::DEFAULT, &agent);

        assert_eq!(event.event_type(), "PlatformDataSkipped");
        assert_eq!(event.agent(), Some("10.0.0.1"));
        assert_eq!(event.org_id(), OrgId::DEFAULT);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = DomainEvent::caches_invalidated(OrgId::new(3), 42);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "CachesInvalidated");
        assert_eq!(json["org_id"], 3);
        assert_eq!(json["model_version"], 42);

        let back: DomainEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.event_type(), "CachesInvalidated");
        assert!(back.agent().is_none());
    }

    #[test]
    fn test_resolved_event_fields() {
        let agent = AgentDescriptor::new("g-1", "10.0.0.1");
        let event = DomainEvent::platform_data_resolved(
            OrgId::DEFAULT,
            &agent,
            "computed",
            Some("Type2".to_string()),
            Some("g-1+p1".to_string()),
            9,
        );
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "PlatformDataResolved");
        assert_eq!(json["group_id"], "g-1");
        assert_eq!(json["tier"], "Type2");
        assert_eq!(json["cache_key"], "g-1+p1");
    }

    #[test]
    fn test_domain_missing_has_no_agent() {
        let event =
            DomainEvent::domain_data_missing(OrgId::new(2), "Type1", "g", "d9", "by_domain_all");
        assert_eq!(event.event_type(), "DomainDataMissing");
        assert!(event.agent().is_none());
        assert_eq!(event.org_id(), OrgId::new(2));
    }
}
