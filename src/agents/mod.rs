//! Market participants owned by the orchestrator.

/// Non-dispatchable generator and its day-ahead forecast ingestion.
pub mod ndg;
/// Indexed ownership of all agents.
pub mod registry;
pub mod types;

pub use ndg::NdgAgent;
pub use registry::AgentRegistry;
pub use types::{GenCo, Lse, StorageUnit};
