//! Resolution Metrics
//!
//! Prometheus counters for platform-data resolution, exported through the
//! `/metrics` endpoint of the binary.
//!
//! | Metric | Labels |
//! |--------|--------|
//! | `agentview_resolutions_total` | org, source, tier |
//! | `agentview_resolve_errors_total` | org, reason |
//! | `agentview_missing_domains_total` | org, tier, family |
//! | `agentview_invalidations_total` | org |
//! | `agentview_build_seconds` | tier |
//! | `agentview_cached_views` | org, tier |

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::domain::ports::OrgId;
use crate::error::Result;
use crate::selector::MissingDomain;
use crate::store::{Resolution, StoreStats};

/// Metric collectors owned by the controller
#[derive(Clone)]
pub struct ResolveMetrics {
    registry: Registry,
    resolutions: IntCounterVec,
    errors: IntCounterVec,
    missing_domains: IntCounterVec,
    invalidations: IntCounterVec,
    build_seconds: HistogramVec,
    cached_views: IntGaugeVec,
}

impl ResolveMetrics {
    /// Create collectors registered into a fresh registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Create collectors registered into `registry`
    pub fn with_registry(registry: Registry) -> Result<Self> {
        let resolutions = IntCounterVec::new(
            Opts::new("agentview_resolutions_total", "Platform-data resolutions by outcome"),
            &["org", "source", "tier"],
        )?;
        let errors = IntCounterVec::new(
            Opts::new("agentview_resolve_errors_total", "Failed platform-data resolutions"),
            &["org", "reason"],
        )?;
        let missing_domains = IntCounterVec::new(
            Opts::new(
                "agentview_missing_domains_total",
                "Referenced domains absent from the global model",
            ),
            &["org", "tier", "family"],
        )?;
        let invalidations = IntCounterVec::new(
            Opts::new("agentview_invalidations_total", "Full cache invalidations"),
            &["org"],
        )?;
        let build_seconds = HistogramVec::new(
            HistogramOpts::new("agentview_build_seconds", "Time spent building a cached view")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["tier"],
        )?;
        let cached_views = IntGaugeVec::new(
            Opts::new("agentview_cached_views", "Views currently held per tier"),
            &["org", "tier"],
        )?;

        registry.register(Box::new(resolutions.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(missing_domains.clone()))?;
        registry.register(Box::new(invalidations.clone()))?;
        registry.register(Box::new(build_seconds.clone()))?;
        registry.register(Box::new(cached_views.clone()))?;

        Ok(Self {
            registry,
            resolutions,
            errors,
            missing_domains,
            invalidations,
            build_seconds,
            cached_views,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_resolution(&self, org_id: OrgId, resolution: &Resolution) {
        let org = org_id.to_string();
        let tier = resolution.tier().map(|t| t.as_str()).unwrap_or("none");
        self.resolutions
            .with_label_values(&[org.as_str(), resolution.source.as_str(), tier])
            .inc();

        for MissingDomain { family, .. } in &resolution.missing {
            self.missing_domains
                .with_label_values(&[org.as_str(), tier, family.to_string().as_str()])
                .inc();
        }
    }

    pub fn record_skip(&self, org_id: OrgId) {
        self.resolutions
            .with_label_values(&[org_id.to_string().as_str(), "skipped", "none"])
            .inc();
    }

    pub fn record_error(&self, org_id: OrgId, reason: &str) {
        self.errors
            .with_label_values(&[org_id.to_string().as_str(), reason])
            .inc();
    }

    pub fn record_invalidation(&self, org_id: OrgId) {
        self.invalidations
            .with_label_values(&[org_id.to_string().as_str()])
            .inc();
    }

    pub fn observe_build(&self, tier: &str, seconds: f64) {
        self.build_seconds.with_label_values(&[tier]).observe(seconds);
    }

    /// Refresh per-tier entry gauges from a store snapshot
    pub fn update_cached_views(&self, stats: &StoreStats) {
        let org = stats.org_id.to_string();
        for (tier, snapshot) in &stats.tiers {
            self.cached_views
                .with_label_values(&[org.as_str(), tier])
                .set(snapshot.entries as i64);
        }
    }

    pub fn resolutions(&self, org_id: OrgId, source: &str, tier: &str) -> u64 {
        self.resolutions
            .with_label_values(&[org_id.to_string().as_str(), source, tier])
            .get()
    }

    pub fn invalidations(&self, org_id: OrgId) -> u64 {
        self.invalidations
            .with_label_values(&[org_id.to_string().as_str()])
            .get()
    }

    /// Render every registered metric in the text exposition format
    pub fn encode(&self) -> Result<(String, Vec<u8>)> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok((encoder.format_type().to_string(), buffer))
    }
}

impl std::fmt::Debug for ResolveMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolveMetrics").finish_non_exhaustive()
    }
}
