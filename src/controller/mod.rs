//! Platform Data Controller
//!
//! Drives the per-organization stores from agent-refresh and
//! topology-change events.
//!
//! # Flow
//!
//! ```text
//! ┌──────────────┐   ControlEvent    ┌──────────────────────────┐
//! │  producers   │ ────────────────▶ │  PlatformDataController  │
//! │ (agent mgmt, │   mpsc channel    │                          │
//! │  model sync) │                   │  TopologyChanged ──▶ install_model ──▶ invalidate
//! └──────────────┘                   │  AgentRefresh ─────▶ spawn(refresh_agent)
//!                                    └──────────────────────────┘
//!                                         │             │
//!                                         ▼             ▼
//!                                   EventPublisher  ResolveMetrics
//! ```
//!
//! Topology changes are applied in arrival order. Agent refreshes run as
//! independent tasks against whichever snapshot is current when they start.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::events::DomainEvent;
use crate::domain::ports::{AgentDescriptor, EventPublisher, GlobalModel, OrgId};
use crate::error::{Error, Result};
use crate::metrics::ResolveMetrics;
use crate::registry::StoreRegistry;
use crate::store::{Resolution, ResolutionSource};

/// Reply channel for a single agent refresh
pub type RefreshReply = oneshot::Sender<Result<Option<Resolution>>>;

/// Input events of the controller loop
pub enum ControlEvent {
    /// Resolve the view of one agent.
    AgentRefresh {
        org_id: OrgId,
        agent: AgentDescriptor,
        reply: Option<RefreshReply>,
    },
    /// A new topology snapshot for an organization.
    TopologyChanged {
        org_id: OrgId,
        model: Arc<dyn GlobalModel>,
    },
}

impl std::fmt::Debug for ControlEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlEvent::AgentRefresh { org_id, agent, .. } => f
                .debug_struct("AgentRefresh")
                .field("org_id", org_id)
                .field("agent", &agent.identity())
                .finish(),
            ControlEvent::TopologyChanged { org_id, model } => f
                .debug_struct("TopologyChanged")
                .field("org_id", org_id)
                .field("version", &model.version())
                .finish(),
        }
    }
}

/// Shared controller state
pub struct PlatformDataController {
    registry: StoreRegistry,
    models: DashMap<OrgId, Arc<dyn GlobalModel>>,
    publisher: Arc<dyn EventPublisher>,
    metrics: ResolveMetrics,
}

impl PlatformDataController {
    pub fn new(publisher: Arc<dyn EventPublisher>, metrics: ResolveMetrics) -> Self {
        Self {
            registry: StoreRegistry::new(),
            models: DashMap::new(),
            publisher,
            metrics,
        }
    }

    pub fn registry(&self) -> &StoreRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &ResolveMetrics {
        &self.metrics
    }

    /// Current snapshot of an organization
    pub fn model(&self, org_id: OrgId) -> Option<Arc<dyn GlobalModel>> {
        self.models.get(&org_id).map(|m| Arc::clone(m.value()))
    }

    /// True once at least one organization has a model
    pub fn is_ready(&self) -> bool {
        !self.models.is_empty()
    }

    /// Install a new snapshot for an organization and drop every view
    /// computed from the previous one.
    #[instrument(skip(self, model), fields(org_id = %org_id, version = model.version()))]
    pub async fn install_model(&self, org_id: OrgId, model: Arc<dyn GlobalModel>) {
        let version = model.version();
        self.models.insert(org_id, model);

        let store = self.registry.get_or_create(org_id);
        store.invalidate_all();
        self.metrics.record_invalidation(org_id);
        self.metrics.update_cached_views(&store.stats());

        info!(org_id = %org_id, version, "installed platform model");
        self.publish(DomainEvent::caches_invalidated(org_id, version))
            .await;
    }

    /// Forget an organization entirely
    pub fn remove_org(&self, org_id: OrgId) {
        self.models.remove(&org_id);
        self.registry.remove(org_id);
    }

    /// Resolve the view of one agent against the current snapshot.
    #[instrument(skip(self, agent), fields(org_id = %org_id, agent = %agent.identity()))]
    pub async fn refresh_agent(
        &self,
        org_id: OrgId,
        agent: &AgentDescriptor,
    ) -> Result<Option<Resolution>> {
        let model = self.model(org_id).ok_or(Error::ModelUnavailable(org_id))?;
        let store = self.registry.get_or_create(org_id);

        let started = Instant::now();
        let outcome = store.resolve(model.as_ref(), agent);
        let elapsed = started.elapsed().as_secs_f64();

        let resolution = match outcome {
            Ok(Some(resolution)) => resolution,
            Ok(None) => {
                self.metrics.record_skip(org_id);
                self.publish(DomainEvent::platform_data_skipped(org_id, agent))
                    .await;
                return Ok(None);
            }
            Err(e @ Error::AgentNotReady { .. }) => {
                warn!(org_id = %org_id, agent = %agent.identity(), "agent not ready");
                self.metrics.record_error(org_id, "agent_not_ready");
                self.publish(DomainEvent::agent_not_ready(org_id, agent, e.to_string()))
                    .await;
                return Err(e);
            }
            Err(e) => {
                self.metrics.record_error(org_id, "internal");
                return Err(e);
            }
        };

        if let ResolutionSource::Computed { tier, .. } = &resolution.source {
            self.metrics.observe_build(tier.as_str(), elapsed);
            self.metrics.update_cached_views(&store.stats());
        }
        self.metrics.record_resolution(org_id, &resolution);

        let mut events = Vec::with_capacity(resolution.missing.len() + 1);
        let tier = resolution.tier().map(|t| t.to_string());
        let key = resolution.cache_key().map(|k| k.to_string());
        for missing in &resolution.missing {
            events.push(DomainEvent::domain_data_missing(
                org_id,
                tier.clone().unwrap_or_default(),
                key.clone().unwrap_or_default(),
                missing.domain.as_str(),
                missing.family.to_string(),
            ));
        }
        events.push(DomainEvent::platform_data_resolved(
            org_id,
            agent,
            resolution.source.as_str(),
            tier,
            key,
            resolution.view.version(),
        ));
        if let Err(e) = self.publisher.publish_all(events).await {
            warn!(org_id = %org_id, error = %e, "failed to publish resolution events");
        }

        Ok(Some(resolution))
    }

    async fn publish(&self, event: DomainEvent) {
        if let Err(e) = self.publisher.publish(event).await {
            warn!(error = %e, "failed to publish domain event");
        }
    }

    /// Consume control events until shutdown is signalled or every sender
    /// is gone. In-flight refreshes are awaited before returning.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::Receiver<ControlEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("Starting platform data controller");
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Platform data controller shutting down");
                        break;
                    }
                }

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!("Agent refresh task failed: {}", e);
                    }
                }

                event = events.recv() => {
                    let Some(event) = event else {
                        debug!("Control channel closed");
                        break;
                    };
                    match event {
                        ControlEvent::TopologyChanged { org_id, model } => {
                            self.install_model(org_id, model).await;
                        }
                        ControlEvent::AgentRefresh { org_id, agent, reply } => {
                            let controller = Arc::clone(&self);
                            tasks.spawn(async move {
                                let result = controller.refresh_agent(org_id, &agent).await;
                                if let Err(e) = &result {
                                    debug!(
                                        org_id = %org_id,
                                        agent = %agent.identity(),
                                        error = %e,
                                        "agent refresh failed"
                                    );
                                }
                                if let Some(reply) = reply {
                                    let _ = reply.send(result);
                                }
                            });
                        }
                    }
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Agent refresh task failed: {}", e);
            }
        }
        info!("Platform data controller stopped");
    }
}

impl std::fmt::Debug for PlatformDataController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformDataController")
            .field("registry", &self.registry)
            .field("models", &self.models.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryEventCollector, InMemoryGlobalModel, TopologySnapshot};
    use crate::domain::ports::{AgentConfig, AgentKind, DomainFilter};
    use crate::selector::TierKind;
    use assert_matches::assert_matches;

    const SNAPSHOT: &str = r#"
devices:
  - { id: 1, name: vm-1, domain: d1 }
interfaces:
  - { id: 10, deviceId: 1, domain: d1 }
  - { id: 11, deviceId: 1, domain: p1, isPod: true }
peerConnections:
  - { id: 100, localNetwork: 1, remoteNetwork: 2 }
"#;

    fn model() -> Arc<dyn GlobalModel> {
        Arc::new(
            InMemoryGlobalModel::from_snapshot(TopologySnapshot::from_yaml(SNAPSHOT).unwrap())
                .unwrap(),
        )
    }

    fn controller() -> (Arc<PlatformDataController>, Arc<InMemoryEventCollector>) {
        let collector = Arc::new(InMemoryEventCollector::new());
        let controller = PlatformDataController::new(
            Arc::clone(&collector) as Arc<dyn EventPublisher>,
            ResolveMetrics::new().unwrap(),
        );
        (Arc::new(controller), collector)
    }

    fn type1_agent() -> AgentDescriptor {
        AgentDescriptor::new("g-1", "10.0.0.1")
            .with_config(AgentConfig::new(false, DomainFilter::only(["d1", "missing"])))
    }

    #[tokio::test]
    async fn test_refresh_without_model() {
        let (controller, _) = controller();
        let result = controller.refresh_agent(OrgId::DEFAULT, &type1_agent()).await;
        assert_matches!(result, Err(Error::ModelUnavailable(org)) if org == OrgId::DEFAULT);
        assert!(!controller.is_ready());
    }

    #[tokio::test]
    async fn test_refresh_publishes_events() {
        let (controller, collector) = controller();
        controller.install_model(OrgId::DEFAULT, model()).await;
        assert!(controller.is_ready());

        let resolution = controller
            .refresh_agent(OrgId::DEFAULT, &type1_agent())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolution.tier(), Some(TierKind::Type1));

        assert_eq!(collector.events_of_type("CachesInvalidated").len(), 1);
        assert_eq!(collector.events_of_type("DomainDataMissing").len(), 1);
        assert_eq!(collector.events_of_type("PlatformDataResolved").len(), 1);
        assert_eq!(
            controller.metrics().resolutions(OrgId::DEFAULT, "computed", "Type1"),
            1
        );
    }

    #[tokio::test]
    async fn test_skip_and_not_ready_events() {
        let (controller, collector) = controller();
        controller.install_model(OrgId::DEFAULT, model()).await;

        let tunnel =
            AgentDescriptor::new("g-1", "10.0.0.2").with_kind(AgentKind::TunnelDecapsulation);
        assert!(controller
            .refresh_agent(OrgId::DEFAULT, &tunnel)
            .await
            .unwrap()
            .is_none());

        let bare = AgentDescriptor::new("g-1", "10.0.0.3");
        assert_matches!(
            controller.refresh_agent(OrgId::DEFAULT, &bare).await,
            Err(Error::AgentNotReady { .. })
        );

        assert_eq!(collector.events_of_type("PlatformDataSkipped").len(), 1);
        assert_eq!(collector.events_of_type("AgentNotReady").len(), 1);
    }

    #[tokio::test]
    async fn test_install_model_invalidates() {
        let (controller, _) = controller();
        controller.install_model(OrgId::DEFAULT, model()).await;
        controller
            .refresh_agent(OrgId::DEFAULT, &type1_agent())
            .await
            .unwrap();

        let store = controller.registry().get(OrgId::DEFAULT).unwrap();
        assert_eq!(store.tier(TierKind::Type1).len(), 1);

        controller.install_model(OrgId::DEFAULT, model()).await;
        assert!(store.tier(TierKind::Type1).is_empty());
        assert_eq!(controller.metrics().invalidations(OrgId::DEFAULT), 2);
    }

    #[tokio::test]
    async fn test_run_loop() {
        let (controller, collector) = controller();
        let (tx, rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(Arc::clone(&controller).run(rx, shutdown_rx));

        tx.send(ControlEvent::TopologyChanged {
            org_id: OrgId::DEFAULT,
            model: model(),
        })
        .await
        .unwrap();

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(ControlEvent::AgentRefresh {
            org_id: OrgId::DEFAULT,
            agent: type1_agent(),
            reply: Some(reply_tx),
        })
        .await
        .unwrap();

        let resolution = reply_rx.await.unwrap().unwrap().unwrap();
        assert_eq!(resolution.cache_key().unwrap().as_str(), "g-1");

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(collector.events_of_type("PlatformDataResolved").len(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_when_channel_closes() {
        let (controller, _) = controller();
        let (tx, rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        drop(tx);
        controller.run(rx, shutdown_rx).await;
    }

    #[tokio::test]
    async fn test_remove_org() {
        let (controller, _) = controller();
        controller.install_model(OrgId::new(5), model()).await;
        controller.remove_org(OrgId::new(5));

        assert!(controller.model(OrgId::new(5)).is_none());
        assert!(controller.registry().get(OrgId::new(5)).is_none());
    }
}
