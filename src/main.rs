//! AgentView
//!
//! Resolves the platform-data view of every agent in an agent list against a
//! topology snapshot and prints one JSON record per agent. Optionally keeps
//! serving Prometheus metrics and health probes afterwards.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           agentview                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │  Topology    │───▶│  Controller  │───▶│  JSON report │       │
//! │  │  snapshot +  │    │  (stores,    │    │  (stdout)    │       │
//! │  │  agent list  │    │   tiers)     │    │              │       │
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! │                      /metrics  /healthz  /readyz                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use agentview::adapters::{InMemoryGlobalModel, LoggingEventPublisher, TopologySnapshot};
use agentview::config::AgentList;
use agentview::domain::EventPublisher;
use agentview::metrics::ResolveMetrics;
use agentview::{AgentDescriptor, ControlEvent, OrgId, PlatformDataController, Resolution};

// =============================================================================
// CLI Arguments
// =============================================================================

/// AgentView - platform-data distribution for monitoring agents
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Topology snapshot (YAML)
    #[arg(long, env = "AGENTVIEW_MODEL")]
    model: PathBuf,

    /// Agent list (YAML)
    #[arg(long, env = "AGENTVIEW_AGENTS")]
    agents: PathBuf,

    /// Organization id, unless the agent list names one
    #[arg(long, env = "AGENTVIEW_ORG_ID", default_value = "1")]
    org_id: u32,

    /// Log every cached view after resolving
    #[arg(long, env = "AGENTVIEW_DUMP")]
    dump: bool,

    /// Metrics server bind address; keeps the process running when set
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    /// Health server bind address; keeps the process running when set
    #[arg(long, env = "HEALTH_ADDR")]
    health_addr: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Report
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AgentReport {
    agent: String,
    group_id: String,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    counts: Option<[usize; 3]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    missing_domains: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl AgentReport {
    fn new(agent: &AgentDescriptor, outcome: &'static str) -> Self {
        Self {
            agent: agent.identity(),
            group_id: agent.group_id.to_string(),
            outcome,
            source: None,
            tier: None,
            cache_key: None,
            version: None,
            counts: None,
            missing_domains: Vec::new(),
            error: None,
        }
    }

    fn from_outcome(
        agent: &AgentDescriptor,
        outcome: agentview::Result<Option<Resolution>>,
    ) -> Self {
        match outcome {
            Ok(None) => Self::new(agent, "skipped"),
            Ok(Some(resolution)) => {
                let view = &resolution.view;
                Self {
                    source: Some(resolution.source.as_str()),
                    tier: resolution.tier().map(|t| t.to_string()),
                    cache_key: resolution.cache_key().map(|k| k.to_string()),
                    version: Some(view.version()),
                    counts: Some([
                        view.device_count(),
                        view.interface_count(),
                        view.peer_connection_count(),
                    ]),
                    missing_domains: resolution
                        .missing
                        .iter()
                        .map(|m| format!("{}:{}", m.family, m.domain))
                        .collect(),
                    ..Self::new(agent, "resolved")
                }
            }
            Err(e) => Self {
                error: Some(e.to_string()),
                ..Self::new(agent, "error")
            },
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    info!("Starting AgentView");
    info!("  Model: {}", args.model.display());
    info!("  Agents: {}", args.agents.display());

    let snapshot = TopologySnapshot::from_yaml_file(&args.model)
        .with_context(|| format!("loading topology snapshot {}", args.model.display()))?;
    let model = Arc::new(InMemoryGlobalModel::from_snapshot(snapshot)?);

    let agent_list = AgentList::from_yaml_file(&args.agents)
        .with_context(|| format!("loading agent list {}", args.agents.display()))?;
    let org_id = agent_list.org_id.unwrap_or(OrgId::new(args.org_id));
    info!("  Organization: {}", org_id);
    info!("  Agent count: {}", agent_list.len());

    let metrics = ResolveMetrics::new()?;
    let publisher: Arc<dyn EventPublisher> = Arc::new(LoggingEventPublisher::new());
    let controller = Arc::new(PlatformDataController::new(publisher, metrics));

    // Run the controller loop
    let (event_tx, event_rx) = mpsc::channel(1024);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let controller_handle = tokio::spawn(Arc::clone(&controller).run(event_rx, shutdown_rx));

    event_tx
        .send(ControlEvent::TopologyChanged {
            org_id,
            model: model.clone(),
        })
        .await
        .context("controller stopped before the model was installed")?;

    // Resolve every agent concurrently
    let mut replies = Vec::with_capacity(agent_list.len());
    for agent in &agent_list.agents {
        let (reply_tx, reply_rx) = oneshot::channel();
        event_tx
            .send(ControlEvent::AgentRefresh {
                org_id,
                agent: agent.clone(),
                reply: Some(reply_tx),
            })
            .await
            .context("controller stopped while agents were queued")?;
        replies.push(reply_rx);
    }

    let outcomes = futures::future::join_all(replies).await;
    let mut reports = Vec::with_capacity(outcomes.len());
    for (agent, outcome) in agent_list.agents.iter().zip(outcomes) {
        let outcome = outcome.context("agent refresh dropped without a reply")?;
        reports.push(AgentReport::from_outcome(agent, outcome));
    }
    println!("{}", serde_json::to_string_pretty(&reports)?);

    if args.dump {
        if let Some(store) = controller.registry().get(org_id) {
            store.dump();
        }
    }
    for stats in controller.registry().stats() {
        info!("Store stats: {}", serde_json::to_string(&stats)?);
    }

    // Keep serving probes when asked to
    if args.metrics_addr.is_some() || args.health_addr.is_some() {
        if let Some(addr) = args.health_addr.clone() {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move {
                if let Err(e) = run_health_server(&addr, controller).await {
                    error!("Health server error: {}", e);
                }
            });
        }

        if let Some(addr) = args.metrics_addr.clone() {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move {
                if let Err(e) = run_metrics_server(&addr, controller).await {
                    error!("Metrics server error: {}", e);
                }
            });
        }

        info!("Serving until interrupted");
        tokio::signal::ctrl_c().await?;
    }

    shutdown_tx.send(true).ok();
    controller_handle.await?;

    info!("AgentView shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "h2=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    // Logs go to stderr; stdout carries the report
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

// =============================================================================
// HTTP Servers
// =============================================================================

mod http {
    use std::net::SocketAddr;

    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::header::{HeaderValue, CONTENT_TYPE};
    use hyper::{Response, StatusCode};
    use tokio::net::TcpListener;
    use tracing::info;

    pub fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(body.into()));
        *response.status_mut() = status;
        response
    }

    pub fn with_content_type(
        mut response: Response<Full<Bytes>>,
        content_type: &str,
    ) -> Response<Full<Bytes>> {
        if let Ok(value) = HeaderValue::from_str(content_type) {
            response.headers_mut().insert(CONTENT_TYPE, value);
        }
        response
    }

    pub async fn bind(addr: &str, name: &str) -> anyhow::Result<TcpListener> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {} server address: {}", name, e))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind {} server: {}", name, e))?;
        info!("{} server listening on {}", name, addr);
        Ok(listener)
    }
}

async fn run_health_server(
    addr: &str,
    controller: Arc<PlatformDataController>,
) -> anyhow::Result<()> {
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, StatusCode};
    use hyper_util::rt::TokioIo;

    let listener = http::bind(addr, "Health").await?;

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| anyhow::anyhow!("Health server accept error: {}", e))?;

        let io = TokioIo::new(stream);
        let controller = Arc::clone(&controller);

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let ready = controller.is_ready();
                async move {
                    let response = match req.uri().path() {
                        "/healthz" | "/livez" => http::text(StatusCode::OK, "ok"),
                        "/readyz" if ready => http::text(StatusCode::OK, "ok"),
                        "/readyz" => {
                            http::text(StatusCode::SERVICE_UNAVAILABLE, "no model installed")
                        }
                        _ => http::text(StatusCode::NOT_FOUND, "not found"),
                    };
                    Ok::<_, std::convert::Infallible>(response)
                }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::error!("Health server connection error: {}", e);
            }
        });
    }
}

async fn run_metrics_server(
    addr: &str,
    controller: Arc<PlatformDataController>,
) -> anyhow::Result<()> {
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, StatusCode};
    use hyper_util::rt::TokioIo;

    let listener = http::bind(addr, "Metrics").await?;

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| anyhow::anyhow!("Metrics server accept error: {}", e))?;

        let io = TokioIo::new(stream);
        let controller = Arc::clone(&controller);

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let encoded = match req.uri().path() {
                    "/metrics" => Some(controller.metrics().encode()),
                    _ => None,
                };
                async move {
                    let response = match encoded {
                        Some(Ok((content_type, body))) => {
                            http::with_content_type(http::text(StatusCode::OK, body), &content_type)
                        }
                        Some(Err(e)) => {
                            http::text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                        }
                        None => http::text(StatusCode::NOT_FOUND, "not found"),
                    };
                    Ok::<_, std::convert::Infallible>(response)
                }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::error!("Metrics server connection error: {}", e);
            }
        });
    }
}
