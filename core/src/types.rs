//! Shared primitive types used across the entire simulation.

use std::collections::BTreeMap;

/// A live tick counter. Ticks have no fixed length; each carries its own `dt`.
pub type Tick = u64;

/// A stable, unique identifier for any entity in the simulation
/// (building, model, research node, achievement, upgrade).
pub type EntityId = String;

/// A resource key in the ledger, e.g. "data" or "compute".
pub type ResourceId = String;

/// The canonical run identifier. A new run starts after every deployment.
pub type RunId = String;

/// Resource -> amount. Ordered so cost iteration and logs are deterministic.
pub type CostMap = BTreeMap<ResourceId, f64>;

// ── Standard resource ids ─────────────────────────────────────────

pub const DATA: &str = "data";
pub const COMPUTE: &str = "compute";
pub const RESEARCH_POINTS: &str = "research_points";
pub const FUNDING: &str = "funding";
