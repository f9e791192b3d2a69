//! AgentView - Agent Platform Data Distribution Engine
//!
//! Decides which slice of the global topology model each monitoring agent
//! receives, and memoizes those slices in four cache tiers so agents with
//! identical needs share one computed view.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    PlatformDataController                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │ StoreRegistry│───▶│  Agent       │───▶│ ViewSelector │       │
//! │  │  (per org)   │    │  PlatformData│    │  (decision   │       │
//! │  │              │    │  Store       │    │   table)     │       │
//! │  └──────────────┘    └──────┬───────┘    └──────────────┘       │
//! │                             │                                    │
//! │                 Type1 │ Type2 │ Type3 │ Dedicated               │
//! │                        CacheTiers                                │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//!                     GlobalModel (port)
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - In-memory global model and event publishers
//! - [`cache`] - Cache tiers and their counters
//! - [`config`] - YAML input documents
//! - [`controller`] - Event-driven controller loop
//! - [`domain`] - Value objects, ports and domain events
//! - [`error`] - Error types
//! - [`metrics`] - Prometheus metrics
//! - [`platform`] - Platform-data views and their builder
//! - [`registry`] - One store per organization
//! - [`selector`] - Agent classification and view recipes
//! - [`store`] - Per-organization memoizing resolver

pub mod adapters;
pub mod cache;
pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod platform;
pub mod registry;
pub mod selector;
pub mod store;

// Re-export commonly used types
pub use controller::{ControlEvent, PlatformDataController};
pub use domain::ports::{
    AgentConfig, AgentDescriptor, AgentKind, DomainFilter, DomainId, GlobalModel, GroupId, OrgId,
};
pub use error::{Error, Result};
pub use platform::{PlatformData, PlatformDataBuilder};
pub use registry::StoreRegistry;
pub use selector::{CacheKey, Selection, TierKind, ViewSelector};
pub use store::{AgentPlatformDataStore, Resolution, ResolutionSource};
