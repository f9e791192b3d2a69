//! Domain Layer
//!
//! Agent-facing value objects, the ports the engine depends on, and the
//! events it emits.
//!
//! - **Ports** (`ports.rs`) - agent descriptors and the `GlobalModel` / `EventPublisher` traits
//! - **Events** (`events.rs`) - records of resolution outcomes for audit and diagnostics

pub mod events;
pub mod ports;

pub use events::DomainEvent;
pub use ports::{
    AgentConfig, AgentDescriptor, AgentKind, DomainFilter, DomainId, EventPublisher, GlobalModel,
    GroupId, OrgId, ALL_DOMAINS,
};
