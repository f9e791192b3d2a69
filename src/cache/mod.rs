//! Platform Data Cache Tiers
//!
//! Memoizes computed agent views. The store owns one tier per cached branch
//! of the view selector:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                 AgentPlatformDataStore (per org)              │
//! ├───────────────┬───────────────┬───────────────┬───────────────┤
//! │    Type1      │    Type2      │    Type3      │   Dedicated   │
//! │ key = group   │ key = group + │ key = group + │ key = group   │
//! │               │   pod domains │   pod domains │               │
//! └───────────────┴───────────────┴───────────────┴───────────────┘
//! ```
//!
//! Each tier has its own `RwLock`; entries are written once and only ever
//! dropped by a full clear.

mod metrics;
mod tier;

pub use metrics::{TierMetrics, TierSnapshot};
pub use tier::CacheTier;
